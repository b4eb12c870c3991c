//! Async trade service exposing the daemon's operations.
//!
//! All blocking work (UTXO fetches, price queries, blinding, signing and
//! broadcast) runs on tokio's blocking pool, bounded by the request timeout.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use lwk_wollet::elements::encode::deserialize;
use lwk_wollet::elements::{AssetId, Transaction};

use crate::balance::balances_by_asset;
use crate::blind::{blind_swap_pset, merge_blinding_keys};
use crate::chain::UtxoSource;
use crate::circuit_breaker::CircuitBreaker;
use crate::config::TradeConfig;
use crate::error::{Error, Result, failure_code};
use crate::market::{
    BalanceWithFee, Market, MarketPolicy, MarketWithFee, PriceWithFee, TradeType,
};
use crate::price::PriceSource;
use crate::pset::{SwapLegs, append_swap_legs, decode_pset, encode_pset};
use crate::selection::select_unspents;
use crate::sign::{extract_transaction, owned_inputs, sign_inputs};
use crate::swap::{
    CompleteMessage, CompleteOutcome, SwapAccept, SwapComplete, SwapFail, SwapRequest, SwapState,
    TradeOutcome, expiry_from, new_message_id,
};
use crate::wallet::Wallet;

pub struct TradeService {
    wallet: Arc<Wallet>,
    utxos: Arc<dyn UtxoSource>,
    prices: Option<Arc<dyn PriceSource>>,
    policy: MarketPolicy,
    breaker: Arc<CircuitBreaker>,
    config: TradeConfig,
}

impl TradeService {
    pub fn new(
        wallet: Wallet,
        utxos: Arc<dyn UtxoSource>,
        prices: Option<Arc<dyn PriceSource>>,
        policy: MarketPolicy,
        config: TradeConfig,
    ) -> Result<Self> {
        if config.fee_allowance == 0 {
            return Err(Error::Configuration("fee allowance must be greater than zero".into()));
        }
        let breaker = Arc::new(CircuitBreaker::new(config.circuit_breaker.clone()));
        log::info!(
            "trade service ready on {} for market {}/{}",
            wallet.network().as_str(),
            policy.market().base_asset,
            policy.market().quote_asset
        );
        Ok(Self {
            wallet: Arc::new(wallet),
            utxos,
            prices,
            policy,
            breaker,
            config,
        })
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn policy(&self) -> &MarketPolicy {
        &self.policy
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn config(&self) -> &TradeConfig {
        &self.config
    }

    /// Run `f` on the blocking pool, bounded by `timeout`.
    async fn run_blocking<F, R>(&self, timeout: Duration, f: F) -> Result<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let handle = tokio::task::spawn_blocking(f);
        match tokio::time::timeout(timeout, handle).await {
            Ok(joined) => joined.map_err(|e| Error::Task(e.to_string())),
            Err(_) => Err(Error::Timeout(timeout)),
        }
    }

    // ── Exposed operations ──────────────────────────────────────────────

    pub fn get_tradable_markets(&self) -> Vec<MarketWithFee> {
        self.policy.tradable_markets()
    }

    pub async fn get_market_balance(&self, market: &Market) -> Result<BalanceWithFee> {
        self.policy.validate_market(market)?;
        let wallet = self.wallet.clone();
        let source = self.utxos.clone();
        let utxos = self
            .run_blocking(self.config.request_timeout, move || {
                source.fetch_unspents(&wallet.addresses(), &wallet.blinding_private_keys())
            })
            .await??;
        log::debug!("balance over {} unspents", utxos.len());
        Ok(self.policy.balance_with_fee(&balances_by_asset(&utxos)))
    }

    pub async fn get_market_price(
        &self,
        market: &Market,
        amount: u64,
        asset: &str,
    ) -> Result<PriceWithFee> {
        self.policy.validate_market(market)?;
        self.policy.validate_amount(amount, asset)?;
        let prices = self
            .prices
            .clone()
            .ok_or_else(|| Error::PriceUnavailable("no price source configured".into()))?;

        let market = self.policy.market().clone();
        let price = self
            .run_blocking(self.config.price_timeout, move || prices.get_price(&market))
            .await??;
        let balance = self.get_market_balance(self.policy.market()).await?;
        let (quoted, other) = self.policy.quote(amount, asset, &price)?;
        Ok(PriceWithFee {
            price,
            fee: self.policy.fee(),
            amount: quoted,
            asset: other,
            balance: balance.balance,
        })
    }

    /// Validate a swap request and, if funding allows, answer it with a
    /// blinded and signed SwapAccept.
    ///
    /// Request errors come back as `Err` before any UTXO is fetched. Failures
    /// while funding, blinding or signing produce
    /// [`TradeOutcome::Rejected`].
    pub async fn propose_trade(
        &self,
        market: &Market,
        trade_type: i32,
        request: SwapRequest,
    ) -> Result<TradeOutcome> {
        self.policy.validate_market(market)?;
        let trade_type = TradeType::from_i32(trade_type)?;
        request.validate()?;
        let (asset_p, asset_r) = self
            .policy
            .validate_swap_assets(&request.asset_p, &request.asset_r)?;

        log::info!(
            "swap request {} ({}): {} of {} for {} of {}",
            request.id,
            trade_type.as_str(),
            request.amount_p,
            request.asset_p,
            request.amount_r,
            request.asset_r
        );

        let negotiation = Negotiation {
            wallet: self.wallet.clone(),
            source: self.utxos.clone(),
            asset_p,
            asset_r,
            fee_asset: self.wallet.network().policy_asset(),
            fee_allowance: self.config.fee_allowance,
            accept_expiry: self.config.accept_expiry,
        };
        let request_id = request.id.clone();
        let result = self
            .run_blocking(self.config.request_timeout, move || negotiation.run(&request))
            .await?;

        Ok(match result {
            Ok(accept) => {
                log::info!("swap request {request_id} accepted as {}", accept.id);
                TradeOutcome::Accepted(accept)
            }
            Err(cause) => {
                log::warn!("swap request {request_id} rejected: {cause}");
                TradeOutcome::Rejected {
                    fail: SwapFail::from_error(&request_id, &cause),
                    cause,
                }
            }
        })
    }

    /// Broadcast the proposer's final transaction, or relay its SwapFail.
    pub async fn complete_trade(&self, message: CompleteMessage) -> Result<CompleteOutcome> {
        let complete = match message {
            CompleteMessage::Fail(fail) => {
                log::info!(
                    "counterparty failed {}: {}",
                    fail.message_id,
                    fail.failure_message
                );
                return Ok(CompleteOutcome::Rejected { fail, cause: None });
            }
            CompleteMessage::Complete(complete) => complete,
        };
        if complete.accept_id.trim().is_empty() {
            return Err(Error::Validation("complete has no accept id".into()));
        }
        if complete.transaction.trim().is_empty() {
            return Err(Error::Validation("complete carries no transaction".into()));
        }

        let source = self.utxos.clone();
        let breaker = self.breaker.clone();
        let transaction = complete.transaction.clone();
        let result = self
            .run_blocking(self.config.request_timeout, move || {
                let tx = final_transaction(&transaction)?;
                breaker.call(|| source.broadcast(&tx))
            })
            .await?;

        Ok(match result {
            Ok(txid) => {
                log::info!("swap {} broadcast as {txid}", complete.accept_id);
                CompleteOutcome::Broadcast {
                    txid: txid.to_string(),
                }
            }
            Err(cause) => {
                log::warn!("swap {} not broadcast: {cause}", complete.accept_id);
                CompleteOutcome::Rejected {
                    fail: complete_fail(&complete, &cause),
                    cause: Some(cause),
                }
            }
        })
    }
}

fn complete_fail(complete: &SwapComplete, cause: &Error) -> SwapFail {
    match cause {
        Error::Broadcast(_) => {
            SwapFail::new(&complete.id, Some(failure_code::BROADCAST), cause.to_string())
        }
        Error::CircuitOpen => SwapFail::new(
            &complete.id,
            Some(failure_code::BROADCAST),
            format!("broadcast error: {cause}"),
        ),
        _ => SwapFail::from_error(&complete.id, cause),
    }
}

/// Decode a final transaction given as hex, or finalize a signed base64 PSET.
pub fn final_transaction(encoded: &str) -> Result<Transaction> {
    let encoded = encoded.trim();
    match hex::decode(encoded) {
        Ok(bytes) => deserialize(&bytes).map_err(|e| Error::TransactionDecode(e.to_string())),
        Err(_) => extract_transaction(decode_pset(encoded)?),
    }
}

/// Everything one negotiation needs, moved onto the blocking pool.
struct Negotiation {
    wallet: Arc<Wallet>,
    source: Arc<dyn UtxoSource>,
    asset_p: AssetId,
    asset_r: AssetId,
    fee_asset: AssetId,
    fee_allowance: u64,
    accept_expiry: Duration,
}

impl Negotiation {
    fn run(&self, request: &SwapRequest) -> Result<SwapAccept> {
        let mut state = SwapState::Received;
        let result = self.advance(request, &mut state);
        if result.is_err() {
            match state.reject() {
                Ok(rejected) => state = rejected,
                Err(e) => log::error!("swap {}: {e}", request.id),
            }
        }
        log::debug!("swap {} ended in state {}", request.id, state.as_str());
        result
    }

    fn advance(&self, request: &SwapRequest, state: &mut SwapState) -> Result<SwapAccept> {
        let mut pset = decode_pset(&request.transaction)?;
        if let Some(index) = owned_inputs(&pset, &self.wallet).first() {
            return Err(Error::Validation(format!(
                "counterparty input {index} spends a wallet script"
            )));
        }
        *state = state.complete()?;

        let utxos = self
            .source
            .fetch_unspents(&self.wallet.addresses(), &self.wallet.blinding_private_keys())?;
        let funding = select_unspents(&utxos, request.amount_r, self.asset_r, &[])?;
        let fee = select_unspents(&utxos, self.fee_allowance, self.fee_asset, &funding.outpoints())?;
        log::debug!(
            "swap {}: {} funding and {} fee inputs out of {} unspents",
            request.id,
            funding.selected.len(),
            fee.selected.len(),
            utxos.len()
        );

        let legs = SwapLegs {
            funding_utxos: funding.selected,
            funding_asset: self.asset_r,
            funding_change: funding.change,
            fee_utxos: fee.selected,
            fee_asset: self.fee_asset,
            fee_amount: self.fee_allowance,
            fee_change: fee.change,
            receive_asset: self.asset_p,
            receive_amount: request.amount_p,
            receive_script: self.wallet.receiving_script().clone(),
            change_script: self.wallet.change_script().clone(),
        };
        let appended = append_swap_legs(&mut pset, &legs)?;

        let own_keys = self.wallet.blinding_keys();
        let input_keys = merge_blinding_keys(&request.input_blinding_key, &own_keys);
        let output_keys = merge_blinding_keys(&request.output_blinding_key, &own_keys);
        let blinder_index = appended
            .inputs
            .first()
            .copied()
            .ok_or_else(|| Error::OutputConstruction("no daemon inputs appended".into()))?;
        blind_swap_pset(&mut pset, &input_keys, &output_keys, blinder_index as u32)?;

        sign_inputs(&mut pset, &self.wallet, &appended.inputs)?;
        *state = state.sign()?;

        let accept = SwapAccept {
            id: new_message_id(),
            request_id: request.id.clone(),
            transaction: encode_pset(&pset),
            input_blinding_key: own_keys.clone(),
            output_blinding_key: own_keys,
            expires_at: expiry_from(Utc::now(), self.accept_expiry),
        };
        *state = state.accept()?;
        Ok(accept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::Fee;
    use crate::network::Network;
    use crate::testing::{MockUtxoSource, StaticPriceSource, TEST_MNEMONIC, explicit_utxo_for};
    use crate::wallet::BlindingKeyMap;

    fn service(source: Arc<MockUtxoSource>, prices: Option<Arc<StaticPriceSource>>) -> TradeService {
        let network = Network::LiquidRegtest;
        let wallet = Wallet::from_mnemonic(TEST_MNEMONIC, network).unwrap();
        let policy = MarketPolicy::new(
            &network.policy_asset().to_string(),
            &"bb".repeat(32),
            Fee::default(),
        )
        .unwrap();
        TradeService::new(
            wallet,
            source,
            prices.map(|p| p as Arc<dyn PriceSource>),
            policy,
            TradeConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn balance_sums_pair_assets() {
        let source = Arc::new(MockUtxoSource::default());
        let svc = service(source.clone(), None);
        let base = svc.policy().base_asset_id();
        source.push_utxo(explicit_utxo_for(base, 1_000, 0, svc.wallet().receiving_script()));
        source.push_utxo(explicit_utxo_for(base, 500, 1, svc.wallet().change_script()));

        let balance = svc.get_market_balance(&svc.policy().market().clone()).await.unwrap();
        assert_eq!(balance.balance.base_amount, 1_500);
        assert_eq!(balance.balance.quote_amount, 0);
        assert_eq!(balance.fee, Fee::default());
        assert_eq!(source.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn price_without_source_is_unavailable() {
        let svc = service(Arc::new(MockUtxoSource::default()), None);
        let market = svc.policy().market().clone();
        let err = svc
            .get_market_price(&market, 10, &market.base_asset)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PriceUnavailable(_)));
    }

    #[tokio::test]
    async fn price_quotes_other_side_with_balance() {
        let source = Arc::new(MockUtxoSource::default());
        let prices = Arc::new(StaticPriceSource::new(0.25, 4.0));
        let svc = service(source, Some(prices.clone()));
        let market = svc.policy().market().clone();

        let quoted = svc
            .get_market_price(&market, 1_000, &market.base_asset)
            .await
            .unwrap();
        assert_eq!(quoted.amount, 4_000);
        assert_eq!(quoted.asset, market.quote_asset);
        assert_eq!(prices.calls(), 1);

        let err = svc.get_market_price(&market, 0, &market.base_asset).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(prices.calls(), 1);
    }

    #[tokio::test]
    async fn fail_message_is_relayed() {
        let source = Arc::new(MockUtxoSource::default());
        let svc = service(source.clone(), None);
        let fail = SwapFail::new("accept-1", Some(9), "changed my mind");
        let outcome = svc
            .complete_trade(CompleteMessage::Fail(fail.clone()))
            .await
            .unwrap();
        match outcome {
            CompleteOutcome::Rejected { fail: relayed, cause } => {
                assert_eq!(relayed, fail);
                assert!(cause.is_none());
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(source.broadcast_calls(), 0);
    }

    #[tokio::test]
    async fn invalid_trade_type_is_a_request_error() {
        let source = Arc::new(MockUtxoSource::default());
        let svc = service(source.clone(), None);
        let market = svc.policy().market().clone();
        let request = SwapRequest {
            id: new_message_id(),
            asset_p: market.quote_asset.clone(),
            amount_p: 100,
            asset_r: market.base_asset.clone(),
            amount_r: 100,
            transaction: "cHNldP8B".into(),
            input_blinding_key: BlindingKeyMap::new(),
            output_blinding_key: BlindingKeyMap::new(),
        };
        let err = svc.propose_trade(&market, 7, request).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(source.fetch_calls(), 0);
    }

    #[test]
    fn zero_fee_allowance_is_a_configuration_error() {
        let network = Network::LiquidRegtest;
        let wallet = Wallet::from_mnemonic(TEST_MNEMONIC, network).unwrap();
        let policy = MarketPolicy::new(
            &network.policy_asset().to_string(),
            &"bb".repeat(32),
            Fee::default(),
        )
        .unwrap();
        let config = TradeConfig {
            fee_allowance: 0,
            ..Default::default()
        };
        let result = TradeService::new(
            wallet,
            Arc::new(MockUtxoSource::default()),
            None,
            policy,
            config,
        );
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
