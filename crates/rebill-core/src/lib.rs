//! REBILL Core - Core types for the REBILL policy engine
//!
//! This crate provides the fundamental types used across the REBILL workspace:
//! - Value types for fact data
//! - Money value object
//! - Rule, condition and action definitions
//! - Error types

pub mod error;
pub mod rule;
pub mod types;

// Re-export commonly used types
pub use error::CoreError;
pub use rule::{Condition, ConditionOperator, Rule, RuleAction, RuleType};
pub use types::{Money, Value};
