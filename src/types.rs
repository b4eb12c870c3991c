//! Wire types for the line-delimited JSON protocol.

use serde::{Deserialize, Serialize};
use zion_sdk::{
    Balance, BalanceInfo, BalanceWithFee, BlindingKeyMap, Fee, Market, MarketWithFee, Price,
    PriceWithFee, SwapAccept, SwapComplete, SwapFail, SwapRequest,
};

/// Blinding-key maps travel as `{scriptHex: base64Key}`.
mod base64_key_map {
    use std::collections::HashMap;

    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use zion_sdk::BlindingKeyMap;

    pub fn serialize<S: Serializer>(map: &BlindingKeyMap, s: S) -> Result<S::Ok, S::Error> {
        let encoded: HashMap<&String, String> =
            map.iter().map(|(k, v)| (k, BASE64.encode(v))).collect();
        encoded.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BlindingKeyMap, D::Error> {
        let encoded: HashMap<String, String> = HashMap::deserialize(d)?;
        encoded
            .into_iter()
            .map(|(script, key)| {
                let bytes = BASE64
                    .decode(key.trim())
                    .map_err(|e| D::Error::custom(format!("blinding key for {script}: {e}")))?;
                Ok((script.trim().to_lowercase(), bytes))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MarketDto {
    pub base_asset: String,
    pub quote_asset: String,
}

impl From<MarketDto> for Market {
    fn from(m: MarketDto) -> Self {
        Market {
            base_asset: m.base_asset,
            quote_asset: m.quote_asset,
        }
    }
}

impl From<&Market> for MarketDto {
    fn from(m: &Market) -> Self {
        MarketDto {
            base_asset: m.base_asset.clone(),
            quote_asset: m.quote_asset.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeeDto {
    pub basis_point: u64,
    pub fixed_base_fee: u64,
    pub fixed_quote_fee: u64,
}

impl From<Fee> for FeeDto {
    fn from(f: Fee) -> Self {
        FeeDto {
            basis_point: f.basis_point,
            fixed_base_fee: f.fixed_base_fee,
            fixed_quote_fee: f.fixed_quote_fee,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MarketWithFeeDto {
    pub market: MarketDto,
    pub fee: FeeDto,
}

impl From<&MarketWithFee> for MarketWithFeeDto {
    fn from(m: &MarketWithFee) -> Self {
        MarketWithFeeDto {
            market: (&m.market).into(),
            fee: m.fee.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BalanceDto {
    pub base_amount: u64,
    pub quote_amount: u64,
}

impl From<Balance> for BalanceDto {
    fn from(b: Balance) -> Self {
        BalanceDto {
            base_amount: b.base_amount,
            quote_amount: b.quote_amount,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BalanceInfoDto {
    pub total: u64,
    pub confirmed: u64,
    pub unconfirmed: u64,
}

impl From<BalanceInfo> for BalanceInfoDto {
    fn from(b: BalanceInfo) -> Self {
        BalanceInfoDto {
            total: b.total,
            confirmed: b.confirmed,
            unconfirmed: b.unconfirmed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BalanceWithFeeDto {
    pub balance: BalanceDto,
    pub fee: FeeDto,
    pub base_detail: BalanceInfoDto,
    pub quote_detail: BalanceInfoDto,
}

impl From<BalanceWithFee> for BalanceWithFeeDto {
    fn from(b: BalanceWithFee) -> Self {
        BalanceWithFeeDto {
            balance: b.balance.into(),
            fee: b.fee.into(),
            base_detail: b.base_detail.into(),
            quote_detail: b.quote_detail.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceDto {
    pub base_price: f64,
    pub quote_price: f64,
}

impl From<Price> for PriceDto {
    fn from(p: Price) -> Self {
        PriceDto {
            base_price: p.base_price,
            quote_price: p.quote_price,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceWithFeeDto {
    pub price: PriceDto,
    pub fee: FeeDto,
    pub amount: u64,
    pub asset: String,
    pub balance: BalanceDto,
}

impl From<PriceWithFee> for PriceWithFeeDto {
    fn from(p: PriceWithFee) -> Self {
        PriceWithFeeDto {
            price: p.price.into(),
            fee: p.fee.into(),
            amount: p.amount,
            asset: p.asset,
            balance: p.balance.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequestDto {
    pub id: String,
    pub asset_p: String,
    pub amount_p: u64,
    pub asset_r: String,
    pub amount_r: u64,
    pub transaction: String,
    #[serde(with = "base64_key_map", default)]
    pub input_blinding_key: BlindingKeyMap,
    #[serde(with = "base64_key_map", default)]
    pub output_blinding_key: BlindingKeyMap,
}

impl From<SwapRequestDto> for SwapRequest {
    fn from(r: SwapRequestDto) -> Self {
        SwapRequest {
            id: r.id,
            asset_p: r.asset_p,
            amount_p: r.amount_p,
            asset_r: r.asset_r,
            amount_r: r.amount_r,
            transaction: r.transaction,
            input_blinding_key: r.input_blinding_key,
            output_blinding_key: r.output_blinding_key,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SwapAcceptDto {
    pub id: String,
    pub request_id: String,
    pub transaction: String,
    #[serde(with = "base64_key_map")]
    pub input_blinding_key: BlindingKeyMap,
    #[serde(with = "base64_key_map")]
    pub output_blinding_key: BlindingKeyMap,
    /// RFC 3339 timestamp.
    pub expires_at: String,
}

impl From<SwapAccept> for SwapAcceptDto {
    fn from(a: SwapAccept) -> Self {
        SwapAcceptDto {
            id: a.id,
            request_id: a.request_id,
            transaction: a.transaction,
            input_blinding_key: a.input_blinding_key,
            output_blinding_key: a.output_blinding_key,
            expires_at: a.expires_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SwapFailDto {
    pub id: String,
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_code: Option<u32>,
    pub failure_message: String,
}

impl From<SwapFail> for SwapFailDto {
    fn from(f: SwapFail) -> Self {
        SwapFailDto {
            id: f.id,
            message_id: f.message_id,
            failure_code: f.failure_code,
            failure_message: f.failure_message,
        }
    }
}

impl From<SwapFailDto> for SwapFail {
    fn from(f: SwapFailDto) -> Self {
        SwapFail {
            id: f.id,
            message_id: f.message_id,
            failure_code: f.failure_code,
            failure_message: f.failure_message,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SwapCompleteDto {
    pub id: String,
    pub accept_id: String,
    pub transaction: String,
}

impl From<SwapCompleteDto> for SwapComplete {
    fn from(c: SwapCompleteDto) -> Self {
        SwapComplete {
            id: c.id,
            accept_id: c.accept_id,
            transaction: c.transaction,
        }
    }
}

// ── Method params and results ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketParams {
    pub market: MarketDto,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketPriceParams {
    pub market: MarketDto,
    pub amount: u64,
    pub asset: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposeTradeParams {
    pub market: MarketDto,
    pub trade_type: i32,
    pub swap_request: SwapRequestDto,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteTradeParams {
    #[serde(default)]
    pub swap_complete: Option<SwapCompleteDto>,
    #[serde(default)]
    pub swap_fail: Option<SwapFailDto>,
}

/// Exactly one of `swap_accept` / `swap_fail` is set. `error` accompanies a
/// fail raised by the daemon itself.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProposeTradeReply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_accept: Option<SwapAcceptDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_fail: Option<SwapFailDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CompleteTradeReply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_fail: Option<SwapFailDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ── Envelope ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: serde_json::Value,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcResponse {
    pub id: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn ok(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: serde_json::Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }
}
