use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use zion_lib::config::DaemonConfig;
use zion_lib::handler::Handler;

#[tokio::main]
async fn main() -> ExitCode {
    // Install the rustls CryptoProvider before any TLS connections.
    // electrum-client pulls in rustls 0.23 which requires an explicit provider.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = match DaemonConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ziond: {e}");
            return ExitCode::FAILURE;
        }
    };
    zion_lib::logging::init(&config.log_level);
    log::debug!("loaded {config:?}");

    let service = match zion_lib::build_service(&config) {
        Ok(service) => service,
        Err(e) => {
            log::error!("startup failed: {e}");
            return ExitCode::FAILURE;
        }
    };
    drop(config);

    let handler = Handler::new(Arc::new(service));
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    match zion_lib::serve(handler, stdin, tokio::io::stdout()).await {
        Ok(()) => {
            log::info!("stdin closed, shutting down");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("protocol loop failed: {e}");
            ExitCode::FAILURE
        }
    }
}
