use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("key derivation error: {0}")]
    KeyDerivation(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("transaction decode error: {0}")]
    TransactionDecode(String),

    #[error("output construction error: {0}")]
    OutputConstruction(String),

    #[error("input {0} has no revealed amount and asset")]
    UnblindedInputMissing(usize),

    #[error("unbalanced transaction: {0}")]
    Unbalanced(String),

    #[error("blinding error: {0}")]
    Blinding(String),

    #[error("signature verification failed for input {0}")]
    SignatureVerification(usize),

    #[error("signer error: {0}")]
    Signer(String),

    #[error("finalize error: {0}")]
    Finalize(String),

    #[error("broadcast error: {0}")]
    Broadcast(String),

    #[error("circuit breaker is open, broadcast rejected")]
    CircuitOpen,

    #[error("electrum error: {0}")]
    Electrum(String),

    #[error("esplora error: {0}")]
    Esplora(String),

    #[error("price unavailable: {0}")]
    PriceUnavailable(String),

    #[error("invalid negotiation transition from {from} on {event}")]
    InvalidTransition {
        from: &'static str,
        event: &'static str,
    },

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("task join error: {0}")]
    Task(String),
}

/// Failure codes carried by a SwapFail.
pub mod failure_code {
    pub const INVALID_REQUEST: u32 = 1;
    pub const INSUFFICIENT_FUNDS: u32 = 2;
    pub const INVALID_TRANSACTION: u32 = 3;
    pub const SIGNATURE: u32 = 4;
    pub const BROADCAST: u32 = 5;
    pub const UNAVAILABLE: u32 = 6;
}

impl Error {
    /// Request-level errors that are rejected before touching the wallet.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// Fatal startup errors.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_) | Error::KeyDerivation(_))
    }

    pub fn failure_code(&self) -> u32 {
        match self {
            Error::Validation(_) | Error::Configuration(_) | Error::KeyDerivation(_) => {
                failure_code::INVALID_REQUEST
            }
            Error::InsufficientFunds(_) => failure_code::INSUFFICIENT_FUNDS,
            Error::TransactionDecode(_)
            | Error::OutputConstruction(_)
            | Error::UnblindedInputMissing(_)
            | Error::Unbalanced(_)
            | Error::Blinding(_)
            | Error::Finalize(_)
            | Error::InvalidTransition { .. } => failure_code::INVALID_TRANSACTION,
            Error::SignatureVerification(_) | Error::Signer(_) => failure_code::SIGNATURE,
            Error::Broadcast(_) | Error::CircuitOpen => failure_code::BROADCAST,
            Error::Electrum(_)
            | Error::Esplora(_)
            | Error::PriceUnavailable(_)
            | Error::Timeout(_)
            | Error::Task(_) => failure_code::UNAVAILABLE,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
