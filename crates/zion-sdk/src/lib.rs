pub mod balance;
pub mod blind;
pub mod chain;
pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod keys;
pub mod market;
pub mod network;
pub mod price;
pub mod pset;
pub mod selection;
pub mod service;
pub mod sign;
pub mod swap;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod utxo;
pub mod wallet;

// Core types
pub use balance::{BalanceInfo, balances_by_asset};
pub use chain::{ElectrumBackend, EsploraBackend, UtxoSource};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use config::TradeConfig;
pub use error::{Error, Result};
pub use keys::AddressRole;
pub use market::{
    Balance, BalanceWithFee, Fee, Market, MarketPolicy, MarketWithFee, PriceWithFee, TradeType,
};
pub use network::Network;
pub use price::{HttpPriceSource, Price, PriceSource};
pub use service::TradeService;
pub use swap::{
    CompleteMessage, CompleteOutcome, SwapAccept, SwapComplete, SwapFail, SwapRequest, SwapState,
    TradeOutcome,
};
pub use utxo::Utxo;
pub use wallet::{AddressAndBlindingKey, BlindingKeyMap, Wallet};

// Re-export LWK for app-layer use
pub use lwk_wollet;
