//! REBILL Policies - Domain decision policies
//!
//! Three decision modules built on the generic rule engine:
//! - Promotion stacking/conflict resolution with optimal-combination search
//! - Retry-backoff decisioning with rule overrides
//! - Billing-attempt gating
//!
//! Policies never return `Err` for ordinary business outcomes (ineligible
//! promotion, non-retriable failure, blocked billing); those are always
//! structured results. Errors are reserved for integrity faults.

pub mod billing;
pub mod error;
pub mod promotion;
pub mod retry;

// Re-export commonly used types
pub use billing::{BillingContext, BillingDecision, BillingDecisionPolicy};
pub use error::PolicyError;
pub use promotion::{
    OptimalCombination, PromotionCode, PromotionContext, PromotionStackingResolver,
    PromotionStackingResult,
};
pub use retry::{
    FailureCategory, RetryConfig, RetryContext, RetryDecision, RetryDecisionPolicy,
};
