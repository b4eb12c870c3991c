//! Swap negotiation messages and the per-request state machine.
//!
//! ```text
//! Received ──> Completing ──> Signed ──> Accepted
//!     │             │
//!     └─────────────┴──────> Rejected
//! ```
//!
//! Every request yields exactly one of [`SwapAccept`] or [`SwapFail`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::RngCore;

use crate::error::{Error, Result};
use crate::market::is_asset_hex;
use crate::wallet::BlindingKeyMap;

/// Random 8-byte message id rendered as 16 hex chars.
pub fn new_message_id() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
    pub id: String,
    /// Asset and amount the proposer sends.
    pub asset_p: String,
    pub amount_p: u64,
    /// Asset and amount the proposer receives.
    pub asset_r: String,
    pub amount_r: u64,
    /// Base64 PSET with the proposer's legs.
    pub transaction: String,
    pub input_blinding_key: BlindingKeyMap,
    pub output_blinding_key: BlindingKeyMap,
}

impl SwapRequest {
    /// Shape checks that need no wallet or market context.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::Validation("request id is empty".into()));
        }
        if self.amount_p == 0 || self.amount_r == 0 {
            return Err(Error::Validation("swap amounts must be greater than zero".into()));
        }
        if !is_asset_hex(self.asset_p.trim()) || !is_asset_hex(self.asset_r.trim()) {
            return Err(Error::Validation("swap assets must be 64 hex chars".into()));
        }
        if self.transaction.trim().is_empty() {
            return Err(Error::Validation("request carries no transaction".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapAccept {
    pub id: String,
    pub request_id: String,
    pub transaction: String,
    pub input_blinding_key: BlindingKeyMap,
    pub output_blinding_key: BlindingKeyMap,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapFail {
    pub id: String,
    /// Id of the message being rejected.
    pub message_id: String,
    pub failure_code: Option<u32>,
    pub failure_message: String,
}

impl SwapFail {
    pub fn new(message_id: &str, failure_code: Option<u32>, failure_message: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            message_id: message_id.to_string(),
            failure_code,
            failure_message: failure_message.into(),
        }
    }

    /// Fail `message_id` with the code and text of `err`.
    pub fn from_error(message_id: &str, err: &Error) -> Self {
        Self::new(message_id, Some(err.failure_code()), err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapComplete {
    pub id: String,
    pub accept_id: String,
    /// Final transaction hex, or a fully signed base64 PSET.
    pub transaction: String,
}

/// What a proposer sends to finish a negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompleteMessage {
    Complete(SwapComplete),
    Fail(SwapFail),
}

/// Result of a ProposeTrade that got past validation.
#[derive(Debug)]
pub enum TradeOutcome {
    Accepted(SwapAccept),
    Rejected { fail: SwapFail, cause: Error },
}

/// Result of a CompleteTrade.
#[derive(Debug)]
pub enum CompleteOutcome {
    Broadcast { txid: String },
    /// `cause` is `None` when the peer itself sent the SwapFail.
    Rejected { fail: SwapFail, cause: Option<Error> },
}

/// Accept expiry measured from `now`.
pub fn expiry_from(now: DateTime<Utc>, expiry: Duration) -> DateTime<Utc> {
    let delta = chrono::Duration::from_std(expiry).unwrap_or(chrono::Duration::MAX);
    now.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapState {
    Received,
    Completing,
    Signed,
    Accepted,
    Rejected,
}

impl SwapState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Completing => "completing",
            Self::Signed => "signed",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected)
    }

    /// Request validated and funding legs are being appended.
    pub fn complete(self) -> Result<Self> {
        self.step(Self::Received, Self::Completing, "complete")
    }

    pub fn sign(self) -> Result<Self> {
        self.step(Self::Completing, Self::Signed, "sign")
    }

    pub fn accept(self) -> Result<Self> {
        self.step(Self::Signed, Self::Accepted, "accept")
    }

    pub fn reject(self) -> Result<Self> {
        match self {
            Self::Received | Self::Completing => Ok(Self::Rejected),
            _ => Err(Error::InvalidTransition {
                from: self.as_str(),
                event: "reject",
            }),
        }
    }

    fn step(self, from: Self, to: Self, event: &'static str) -> Result<Self> {
        if self == from {
            Ok(to)
        } else {
            Err(Error::InvalidTransition {
                from: self.as_str(),
                event,
            })
        }
    }
}
