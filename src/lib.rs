pub mod config;
pub mod handler;
pub mod logging;
pub mod types;

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use zion_sdk::{
    ElectrumBackend, EsploraBackend, HttpPriceSource, PriceSource, TradeService, UtxoSource,
    Wallet,
};

use crate::config::{Backend, ConfigError, DaemonConfig};
use crate::handler::Handler;

/// Build the trade service described by `config`.
pub fn build_service(config: &DaemonConfig) -> Result<TradeService, ConfigError> {
    let wallet = Wallet::from_mnemonic(&config.mnemonic, config.network)?;
    let policy = config.market_policy()?;
    let timeout = config.http_timeout();

    let utxos: Arc<dyn UtxoSource> = match config.backend {
        Backend::Electrum => Arc::new(ElectrumBackend::new(&config.electrum_url)),
        Backend::Esplora => Arc::new(EsploraBackend::new(&config.explorer_endpoint, timeout)),
    };
    let prices: Arc<dyn PriceSource> = Arc::new(HttpPriceSource::new(&config.price_endpoint, timeout));

    let receiving = wallet.address();
    log::info!(
        "wallet {} receiving address {}",
        config.network.as_str(),
        receiving.address
    );
    Ok(TradeService::new(
        wallet,
        utxos,
        Some(prices),
        policy,
        config.trade_config(),
    )?)
}

/// Serve line-delimited JSON requests from `reader` until EOF. Requests are
/// handled concurrently; replies are written whole, one per line, in
/// completion order.
pub async fn serve<R, W>(handler: Handler, reader: R, writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    let writer_task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(reply) = rx.recv().await {
            writer.write_all(reply.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    let mut lines = reader.lines();
    let mut tasks = tokio::task::JoinSet::new();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let handler = handler.clone();
        let tx = tx.clone();
        tasks.spawn(async move {
            let reply = handler.handle_line(&line).await;
            let _ = tx.send(reply);
        });
    }
    while tasks.join_next().await.is_some() {}
    drop(tx);

    writer_task
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?
}
