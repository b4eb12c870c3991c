use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use zeroize::Zeroizing;
use zion_sdk::market::is_asset_hex;
use zion_sdk::{Fee, MarketPolicy, Network, TradeConfig};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid mnemonic")]
    InvalidMnemonic,

    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("{0}")]
    Engine(#[from] zion_sdk::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Electrum,
    Esplora,
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "electrum" => Ok(Backend::Electrum),
            "esplora" | "explorer" => Ok(Backend::Esplora),
            other => Err(format!("unknown backend {other:?}")),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
struct FileConfig {
    network: Option<String>,
    mnemonic: Option<String>,
    backend: Option<String>,
    explorer_endpoint: Option<String>,
    electrum_url: Option<String>,
    price_endpoint: Option<String>,
    base_asset_id: Option<String>,
    quote_asset_id: Option<String>,
    fee: FileFee,
    fee_allowance: Option<u64>,
    log_level: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
struct FileFee {
    basis_point: Option<u64>,
    fixed_base_fee: Option<u64>,
    fixed_quote_fee: Option<u64>,
}

/// Daemon settings, resolved from an optional JSON file and `ZION_*`
/// environment variables. Environment values win.
pub struct DaemonConfig {
    pub network: Network,
    pub mnemonic: Zeroizing<String>,
    pub backend: Backend,
    pub explorer_endpoint: String,
    pub electrum_url: String,
    pub price_endpoint: String,
    pub base_asset_id: String,
    pub quote_asset_id: String,
    pub fee: Fee,
    pub fee_allowance: u64,
    pub log_level: String,
}

impl std::fmt::Debug for DaemonConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonConfig")
            .field("network", &self.network)
            .field("mnemonic", &"<redacted>")
            .field("backend", &self.backend)
            .field("explorer_endpoint", &self.explorer_endpoint)
            .field("electrum_url", &self.electrum_url)
            .field("price_endpoint", &self.price_endpoint)
            .field("base_asset_id", &self.base_asset_id)
            .field("quote_asset_id", &self.quote_asset_id)
            .field("fee", &self.fee)
            .field("fee_allowance", &self.fee_allowance)
            .field("log_level", &self.log_level)
            .finish()
    }
}

fn parse_env<T: std::str::FromStr>(
    env: &HashMap<String, String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env.get(name).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(raw) => raw.parse().map(Some).map_err(|e: T::Err| ConfigError::Invalid {
            key: name,
            reason: e.to_string(),
        }),
        None => Ok(None),
    }
}

fn check_asset(key: &'static str, value: &str) -> Result<(), ConfigError> {
    if is_asset_hex(value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            key,
            reason: format!("expected 64 hex chars, got {value:?}"),
        })
    }
}

impl DaemonConfig {
    /// Load from `path` (if any) and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = path.map(fs::read_to_string).transpose()?;
        let env: HashMap<String, String> = std::env::vars()
            .filter(|(k, _)| k.starts_with("ZION_"))
            .collect();
        Self::from_sources(file.as_deref(), &env)
    }

    pub fn from_sources(
        file_json: Option<&str>,
        env: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let file: FileConfig = match file_json {
            Some(json) => serde_json::from_str(json)?,
            None => FileConfig::default(),
        };

        let network = match parse_env::<Network>(env, "ZION_NETWORK")? {
            Some(n) => n,
            None => file
                .network
                .as_deref()
                .unwrap_or("regtest")
                .parse()
                .map_err(|reason| ConfigError::Invalid {
                    key: "network",
                    reason,
                })?,
        };

        let mnemonic = Zeroizing::new(
            env.get("ZION_MNEMONIC")
                .cloned()
                .or(file.mnemonic)
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .ok_or(ConfigError::Missing("mnemonic"))?,
        );
        let _checked: bip39::Mnemonic = mnemonic
            .parse()
            .map_err(|_| ConfigError::InvalidMnemonic)?;

        let backend = match parse_env::<Backend>(env, "ZION_BACKEND")? {
            Some(b) => b,
            None => file
                .backend
                .as_deref()
                .unwrap_or("esplora")
                .parse()
                .map_err(|reason| ConfigError::Invalid {
                    key: "backend",
                    reason,
                })?,
        };

        let string = |name: &str, from_file: Option<String>, default: &str| {
            env.get(name)
                .cloned()
                .or(from_file)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let explorer_endpoint = string(
            "ZION_EXPLORER_ENDPOINT",
            file.explorer_endpoint,
            "http://localhost:3001",
        );
        let electrum_url = string(
            "ZION_ELECTRUM_URL",
            file.electrum_url,
            network.default_electrum_url(),
        );
        let price_endpoint = string(
            "ZION_PRICE_ENDPOINT",
            file.price_endpoint,
            "http://localhost:4040/btc/usd",
        );
        let base_asset_id = string(
            "ZION_BASE_ASSET_ID",
            file.base_asset_id,
            &network.policy_asset().to_string(),
        )
        .to_lowercase();
        let quote_asset_id = string("ZION_QUOTE_ASSET_ID", file.quote_asset_id, "").to_lowercase();
        if quote_asset_id.is_empty() {
            return Err(ConfigError::Missing("quoteAssetId"));
        }
        check_asset("baseAssetId", &base_asset_id)?;
        check_asset("quoteAssetId", &quote_asset_id)?;
        if base_asset_id == quote_asset_id {
            return Err(ConfigError::Invalid {
                key: "quoteAssetId",
                reason: "base and quote asset must differ".into(),
            });
        }

        let defaults = Fee::default();
        let fee = Fee {
            basis_point: parse_env(env, "ZION_BASIS_POINT_FEE")?
                .or(file.fee.basis_point)
                .unwrap_or(defaults.basis_point),
            fixed_base_fee: parse_env(env, "ZION_BASE_FIXED_FEE")?
                .or(file.fee.fixed_base_fee)
                .unwrap_or(defaults.fixed_base_fee),
            fixed_quote_fee: parse_env(env, "ZION_QUOTE_FIXED_FEE")?
                .or(file.fee.fixed_quote_fee)
                .unwrap_or(defaults.fixed_quote_fee),
        };

        let fee_allowance = parse_env(env, "ZION_FEE_ALLOWANCE")?
            .or(file.fee_allowance)
            .unwrap_or(TradeConfig::default().fee_allowance);
        if fee_allowance == 0 {
            return Err(ConfigError::Invalid {
                key: "feeAllowance",
                reason: "must be greater than zero".into(),
            });
        }

        let log_level = string("ZION_LOG_LEVEL", file.log_level, "info");

        Ok(Self {
            network,
            mnemonic,
            backend,
            explorer_endpoint,
            electrum_url,
            price_endpoint,
            base_asset_id,
            quote_asset_id,
            fee,
            fee_allowance,
            log_level,
        })
    }

    pub fn market_policy(&self) -> Result<MarketPolicy, ConfigError> {
        Ok(MarketPolicy::new(
            &self.base_asset_id,
            &self.quote_asset_id,
            self.fee,
        )?)
    }

    pub fn trade_config(&self) -> TradeConfig {
        TradeConfig {
            fee_allowance: self.fee_allowance,
            ..TradeConfig::default()
        }
    }

    /// Timeout for collaborators reached over the network.
    pub fn http_timeout(&self) -> Duration {
        self.trade_config().price_timeout
    }
}
