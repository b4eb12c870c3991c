use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::market::Market;

/// Last known price of the pair: quote per base and base per quote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Price {
    pub base_price: f64,
    pub quote_price: f64,
}

impl Price {
    /// Parse the decimal strings served by the price feed.
    pub fn from_decimal_strs(base_price: &str, quote_price: &str) -> Result<Self> {
        Ok(Self {
            base_price: parse_decimal(base_price)?,
            quote_price: parse_decimal(quote_price)?,
        })
    }
}

fn parse_decimal(s: &str) -> Result<f64> {
    let value: f64 = s
        .trim()
        .parse()
        .map_err(|e| Error::PriceUnavailable(format!("bad decimal {s:?}: {e}")))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::PriceUnavailable(format!("price must be positive, got {s}")));
    }
    Ok(value)
}

/// Source of the pair price.
pub trait PriceSource: Send + Sync {
    fn get_price(&self, market: &Market) -> Result<Price>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceReply {
    base_price: String,
    quote_price: String,
}

/// Price feed over plain HTTP GET returning
/// `{"basePrice": "...", "quotePrice": "..."}`.
pub struct HttpPriceSource {
    endpoint: String,
    timeout: Duration,
}

impl HttpPriceSource {
    pub fn new(endpoint: &str, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl PriceSource for HttpPriceSource {
    fn get_price(&self, _market: &Market) -> Result<Price> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::PriceUnavailable(e.to_string()))?;
        let resp = client
            .get(&self.endpoint)
            .send()
            .map_err(|e| Error::PriceUnavailable(format!("GET {}: {e}", self.endpoint)))?;
        if resp.status() != reqwest::StatusCode::OK {
            return Err(Error::PriceUnavailable(format!(
                "GET {}: status {}",
                self.endpoint,
                resp.status()
            )));
        }
        let body = resp
            .text()
            .map_err(|e| Error::PriceUnavailable(e.to_string()))?;
        parse_price_reply(&body)
    }
}

fn parse_price_reply(body: &str) -> Result<Price> {
    let reply: PriceReply =
        serde_json::from_str(body).map_err(|e| Error::PriceUnavailable(format!("bad reply: {e}")))?;
    Price::from_decimal_strs(&reply.base_price, &reply.quote_price)
}
