use std::collections::HashMap;

use lwk_wollet::elements::AssetId;

use crate::balance::BalanceInfo;
use crate::error::{Error, Result};
use crate::price::Price;
use crate::pset::parse_asset_id;

/// A trading pair as carried on the wire: two 64-hex-char asset ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Market {
    pub base_asset: String,
    pub quote_asset: String,
}

/// Fee schedule: a basis-point rate plus fixed per-asset surcharges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fee {
    pub basis_point: u64,
    pub fixed_base_fee: u64,
    pub fixed_quote_fee: u64,
}

impl Default for Fee {
    fn default() -> Self {
        Self {
            basis_point: 100,
            fixed_base_fee: 650,
            fixed_quote_fee: 4000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketWithFee {
    pub market: Market,
    pub fee: Fee,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Balance {
    pub base_amount: u64,
    pub quote_amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceWithFee {
    pub balance: Balance,
    pub fee: Fee,
    /// Confirmation split of each side.
    pub base_detail: BalanceInfo,
    pub quote_detail: BalanceInfo,
}

/// A price quote with everything a caller shows in one go.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceWithFee {
    pub price: Price,
    pub fee: Fee,
    /// Equivalent amount in `asset`, the other side of the pair.
    pub amount: u64,
    pub asset: String,
    pub balance: Balance,
}

/// Direction of a trade from the proposer's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeType {
    Buy = 0,
    Sell = 1,
}

impl TradeType {
    pub fn from_i32(v: i32) -> Result<Self> {
        match v {
            0 => Ok(Self::Buy),
            1 => Ok(Self::Sell),
            _ => Err(Error::Validation(format!("unknown trade type {v}"))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

/// True if `s` is exactly 64 hex characters.
pub fn is_asset_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// The single configured market and its fee.
#[derive(Debug, Clone)]
pub struct MarketPolicy {
    market: Market,
    base_asset_id: AssetId,
    quote_asset_id: AssetId,
    fee: Fee,
}

impl MarketPolicy {
    pub fn new(base_asset: &str, quote_asset: &str, fee: Fee) -> Result<Self> {
        let base_asset = base_asset.trim().to_lowercase();
        let quote_asset = quote_asset.trim().to_lowercase();
        for (name, asset) in [("base", &base_asset), ("quote", &quote_asset)] {
            if !is_asset_hex(asset) {
                return Err(Error::Configuration(format!(
                    "{name} asset must be 64 hex chars, got {asset:?}"
                )));
            }
        }
        if base_asset == quote_asset {
            return Err(Error::Configuration("base and quote asset are the same".into()));
        }
        if fee.basis_point > 10_000 {
            return Err(Error::Configuration(format!(
                "basis point fee {} exceeds 10000",
                fee.basis_point
            )));
        }
        let base_asset_id =
            parse_asset_id(&base_asset).map_err(|e| Error::Configuration(e.to_string()))?;
        let quote_asset_id =
            parse_asset_id(&quote_asset).map_err(|e| Error::Configuration(e.to_string()))?;
        Ok(Self {
            market: Market {
                base_asset,
                quote_asset,
            },
            base_asset_id,
            quote_asset_id,
            fee,
        })
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    pub fn fee(&self) -> Fee {
        self.fee
    }

    pub fn base_asset_id(&self) -> AssetId {
        self.base_asset_id
    }

    pub fn quote_asset_id(&self) -> AssetId {
        self.quote_asset_id
    }

    pub fn tradable_markets(&self) -> Vec<MarketWithFee> {
        vec![MarketWithFee {
            market: self.market.clone(),
            fee: self.fee,
        }]
    }

    /// Reject anything but the configured pair.
    pub fn validate_market(&self, market: &Market) -> Result<()> {
        let base = market.base_asset.trim();
        let quote = market.quote_asset.trim();
        if !is_asset_hex(base) || !is_asset_hex(quote) {
            return Err(Error::Validation("market assets must be 64 hex chars".into()));
        }
        if base != self.market.base_asset || quote != self.market.quote_asset {
            return Err(Error::Validation(format!(
                "market {}/{} is not tradable",
                base, quote
            )));
        }
        Ok(())
    }

    /// Check that a swap exchanges exactly the pair's two assets and return
    /// them parsed as (sent by proposer, received by proposer).
    pub fn validate_swap_assets(&self, asset_p: &str, asset_r: &str) -> Result<(AssetId, AssetId)> {
        let asset_p = asset_p.trim();
        let asset_r = asset_r.trim();
        let pair = [&self.market.base_asset, &self.market.quote_asset];
        let in_pair = |a: &str| pair.iter().any(|p| a == p.as_str());
        if !in_pair(asset_p) || !in_pair(asset_r) || asset_p == asset_r {
            return Err(Error::Validation(format!(
                "swap {asset_p} -> {asset_r} does not trade the configured pair"
            )));
        }
        let p = parse_asset_id(asset_p).map_err(|e| Error::Validation(e.to_string()))?;
        let r = parse_asset_id(asset_r).map_err(|e| Error::Validation(e.to_string()))?;
        Ok((p, r))
    }

    /// Reject amounts of zero and assets outside the pair.
    pub fn validate_amount(&self, amount: u64, asset: &str) -> Result<()> {
        if amount == 0 {
            return Err(Error::Validation("amount must be greater than zero".into()));
        }
        let asset = asset.trim();
        if asset != self.market.base_asset && asset != self.market.quote_asset {
            return Err(Error::Validation(format!("asset {asset} is not in the market")));
        }
        Ok(())
    }

    /// Pair balance out of a per-asset balance map.
    pub fn balance(&self, balances: &HashMap<AssetId, BalanceInfo>) -> Balance {
        let total = |asset: &AssetId| balances.get(asset).map(|b| b.total).unwrap_or(0);
        Balance {
            base_amount: total(&self.base_asset_id),
            quote_amount: total(&self.quote_asset_id),
        }
    }

    pub fn balance_with_fee(&self, balances: &HashMap<AssetId, BalanceInfo>) -> BalanceWithFee {
        let detail = |asset: &AssetId| balances.get(asset).copied().unwrap_or_default();
        BalanceWithFee {
            balance: self.balance(balances),
            fee: self.fee,
            base_detail: detail(&self.base_asset_id),
            quote_detail: detail(&self.quote_asset_id),
        }
    }

    /// Convert `amount` of `asset` into the other side of the pair.
    ///
    /// Quote-denominated amounts convert to base with the base price; base
    /// amounts convert to quote with the quote price. Results are floored.
    pub fn quote(&self, amount: u64, asset: &str, price: &Price) -> Result<(u64, String)> {
        self.validate_amount(amount, asset)?;
        let asset = asset.trim();
        let (rate, other) = if asset == self.market.quote_asset {
            (price.base_price, &self.market.base_asset)
        } else {
            (price.quote_price, &self.market.quote_asset)
        };
        let converted = (amount as f64 * rate).floor();
        if !converted.is_finite() || converted < 0.0 || converted > u64::MAX as f64 {
            return Err(Error::Validation(format!(
                "amount {amount} out of range at rate {rate}"
            )));
        }
        Ok((converted as u64, other.clone()))
    }
}
