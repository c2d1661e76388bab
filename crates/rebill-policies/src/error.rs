//! Policy error types

use thiserror::Error;

/// Policy error type
#[derive(Error, Debug)]
pub enum PolicyError {
    /// Core invariant violation (malformed rule, bad money arithmetic)
    #[error(transparent)]
    Core(#[from] rebill_core::CoreError),

    /// Combination search input exceeds the exponential-search bound
    #[error("Too many promotion codes for combination search: {count} (max {max})")]
    TooManyCodes { count: usize, max: usize },
}

/// Result type for policy operations
pub type Result<T> = std::result::Result<T, PolicyError>;
