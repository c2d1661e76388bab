//! REBILL Engine - Generic rule engine
//!
//! This crate drives rule evaluation for the REBILL policy engine:
//! - Execution context with dot-path fact lookup
//! - Rule registry with priority-sorted per-type buckets
//! - Condition evaluator and action executor
//! - Batch orchestrator with terminal/fail-fast semantics

pub mod context;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod executor;
mod field_lookup;
pub mod registry;
pub mod result;

// Re-export commonly used types
pub use context::ExecutionContext;
pub use engine::RulesEngine;
pub use error::EngineError;
pub use registry::{RegistryStatistics, RuleRegistry, SharedRegistry};
pub use result::{ExecutionResult, RuleError};
