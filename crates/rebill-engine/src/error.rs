//! Engine error types
//!
//! These are integrity faults only. Ordinary business outcomes (missing
//! rule, disabled rule, failed action) are carried as structured fields of
//! [`crate::result::ExecutionResult`], never as an `Err`.

use thiserror::Error;

/// Engine error
#[derive(Error, Debug)]
pub enum EngineError {
    /// Rule definition failed validation
    #[error(transparent)]
    InvalidRule(#[from] rebill_core::CoreError),

    /// An action kind the executor does not know how to run
    #[error("Unknown action kind: {0}")]
    UnknownActionKind(String),

    /// Action handler failure
    #[error("Action execution failed: {0}")]
    ActionFailed(String),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
