use std::time::Duration;

use crate::circuit_breaker::CircuitBreakerConfig;

/// Tunables of [`TradeService`](crate::service::TradeService).
#[derive(Debug, Clone)]
pub struct TradeConfig {
    /// Policy-asset amount reserved for the network fee of every swap.
    pub fee_allowance: u64,
    /// Lifetime of a SwapAccept.
    pub accept_expiry: Duration,
    /// Bound on the blocking work of a single request.
    pub request_timeout: Duration,
    /// Bound on a price feed query.
    pub price_timeout: Duration,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self {
            fee_allowance: 650,
            accept_expiry: Duration::from_secs(120),
            request_timeout: Duration::from_secs(30),
            price_timeout: Duration::from_secs(10),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}
