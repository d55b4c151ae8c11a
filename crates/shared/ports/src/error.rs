use bourse_core::{Amount, Symbol};
use thiserror::Error;

/// Error kinds surfaced by the ledger, the book and the matching engine
///
/// Only `Contention` is worth retrying; every other kind is terminal for the
/// request that produced it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient {currency} balance: required {required}, available {available}")]
    InsufficientBalance {
        currency: Symbol,
        required: Amount,
        available: Amount,
    },

    #[error("Insufficient locked {currency}: required {required}, locked {locked}")]
    InsufficientLocked {
        currency: Symbol,
        required: Amount,
        locked: Amount,
    },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("No liquidity: {0}")]
    NoLiquidity(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Lock wait timed out: {0}")]
    Contention(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExchangeError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExchangeError::Contention(_))
    }
}

pub type ExchangeResult<T> = std::result::Result<T, ExchangeError>;
