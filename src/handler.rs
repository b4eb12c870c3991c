use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use zion_sdk::{CompleteMessage, CompleteOutcome, Market, TradeOutcome, TradeService};

use crate::types::{
    BalanceWithFeeDto, CompleteTradeParams, CompleteTradeReply, MarketParams, MarketPriceParams,
    MarketWithFeeDto, PriceWithFeeDto, ProposeTradeParams, ProposeTradeReply, RpcRequest,
    RpcResponse,
};

pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const SERVER_ERROR: i32 = -32000;

/// Dispatches protocol requests onto a [`TradeService`].
#[derive(Clone)]
pub struct Handler {
    service: Arc<TradeService>,
}

type Reply = Result<Value, (i32, String)>;

fn params<T: DeserializeOwned>(params: Value) -> Result<T, (i32, String)> {
    serde_json::from_value(params).map_err(|e| (INVALID_PARAMS, format!("invalid params: {e}")))
}

fn to_value<T: Serialize>(value: T) -> Reply {
    serde_json::to_value(value).map_err(|e| (SERVER_ERROR, e.to_string()))
}

fn engine_error(e: zion_sdk::Error) -> (i32, String) {
    let code = if e.is_validation() {
        INVALID_PARAMS
    } else {
        SERVER_ERROR
    };
    (code, e.to_string())
}

impl Handler {
    pub fn new(service: Arc<TradeService>) -> Self {
        Self { service }
    }

    /// Handle one JSON line and return the JSON reply line.
    pub async fn handle_line(&self, line: &str) -> String {
        let response = match serde_json::from_str::<RpcRequest>(line) {
            Ok(request) => self.handle(request).await,
            Err(e) => RpcResponse::err(Value::Null, PARSE_ERROR, format!("parse error: {e}")),
        };
        serde_json::to_string(&response).unwrap_or_else(|e| {
            format!(r#"{{"id":null,"error":{{"code":{SERVER_ERROR},"message":"{e}"}}}}"#)
        })
    }

    pub async fn handle(&self, request: RpcRequest) -> RpcResponse {
        log::debug!("request {} {}", request.id, request.method);
        let reply = match request.method.as_str() {
            "getTradableMarkets" => self.tradable_markets(),
            "getMarketBalance" => self.market_balance(request.params).await,
            "getMarketPrice" => self.market_price(request.params).await,
            "proposeTrade" => self.propose_trade(request.params).await,
            "completeTrade" => self.complete_trade(request.params).await,
            other => Err((METHOD_NOT_FOUND, format!("unknown method {other}"))),
        };
        match reply {
            Ok(result) => RpcResponse::ok(request.id, result),
            Err((code, message)) => {
                log::info!("{} failed: {message}", request.method);
                RpcResponse::err(request.id, code, message)
            }
        }
    }

    fn tradable_markets(&self) -> Reply {
        let markets: Vec<MarketWithFeeDto> = self
            .service
            .get_tradable_markets()
            .iter()
            .map(Into::into)
            .collect();
        to_value(serde_json::json!({ "markets": markets }))
    }

    async fn market_balance(&self, raw: Value) -> Reply {
        let p: MarketParams = params(raw)?;
        let balance = self
            .service
            .get_market_balance(&Market::from(p.market))
            .await
            .map_err(engine_error)?;
        to_value(BalanceWithFeeDto::from(balance))
    }

    async fn market_price(&self, raw: Value) -> Reply {
        let p: MarketPriceParams = params(raw)?;
        let price = self
            .service
            .get_market_price(&Market::from(p.market), p.amount, &p.asset)
            .await
            .map_err(engine_error)?;
        to_value(PriceWithFeeDto::from(price))
    }

    async fn propose_trade(&self, raw: Value) -> Reply {
        let p: ProposeTradeParams = params(raw)?;
        let outcome = self
            .service
            .propose_trade(&Market::from(p.market), p.trade_type, p.swap_request.into())
            .await
            .map_err(engine_error)?;
        let reply = match outcome {
            TradeOutcome::Accepted(accept) => ProposeTradeReply {
                swap_accept: Some(accept.into()),
                ..Default::default()
            },
            TradeOutcome::Rejected { fail, cause } => ProposeTradeReply {
                swap_fail: Some(fail.into()),
                error: Some(cause.to_string()),
                ..Default::default()
            },
        };
        to_value(reply)
    }

    async fn complete_trade(&self, raw: Value) -> Reply {
        let p: CompleteTradeParams = params(raw)?;
        let message = match (p.swap_complete, p.swap_fail) {
            (Some(complete), None) => CompleteMessage::Complete(complete.into()),
            (None, Some(fail)) => CompleteMessage::Fail(fail.into()),
            _ => {
                return Err((
                    INVALID_PARAMS,
                    "exactly one of swapComplete or swapFail is required".into(),
                ));
            }
        };
        let outcome = self
            .service
            .complete_trade(message)
            .await
            .map_err(engine_error)?;
        let reply = match outcome {
            CompleteOutcome::Broadcast { txid } => CompleteTradeReply {
                txid: Some(txid),
                ..Default::default()
            },
            CompleteOutcome::Rejected { fail, cause } => CompleteTradeReply {
                swap_fail: Some(fail.into()),
                error: cause.map(|e| e.to_string()),
                ..Default::default()
            },
        };
        to_value(reply)
    }
}
