//! Error types for REBILL Core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum CoreError {
    /// A rule definition violated a structural invariant
    #[error("Invalid rule: {field}: {reason}")]
    InvalidRule { field: String, reason: String },

    /// A monetary amount was negative where only non-negative values are allowed
    #[error("Negative amount: {0}")]
    NegativeAmount(i64),

    /// Arithmetic between two different currencies
    #[error("Currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },

    /// Invalid value
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
