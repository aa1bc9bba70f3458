//! Error taxonomy for caller-facing operations.
//!
//! Every operation either fully succeeds or returns exactly one of these
//! variants; partial mutations are never observable (the storage layer
//! commits each operation in a single transaction).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed or missing input. Recoverable by the caller fixing the
    /// request; never retried automatically.
    #[error("validation error: {0}")]
    Validation(String),

    /// Referenced order/user/wallet does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Acting party does not own or control the resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Transition is illegal from the current state (double payment,
    /// status regression, driver already assigned).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Wallet debit exceeds balance. The order is left unchanged.
    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: i64, requested: i64 },

    /// Underlying persistence failed. Safe to retry the whole operation,
    /// nothing partial was committed.
    #[error("store error: {0}")]
    Store(String),
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
