//! Execution result types
//!
//! Business outcomes are always carried here as structured fields; the
//! engine only returns `Err` for integrity faults.

use rebill_core::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Error codes surfaced in [`RuleError::code`]
pub mod codes {
    pub const RULE_NOT_FOUND: &str = "RULE_NOT_FOUND";
    pub const RULE_DISABLED: &str = "RULE_DISABLED";
    pub const RULE_EXECUTION_ERROR: &str = "RULE_EXECUTION_ERROR";
    pub const ENGINE_ERROR: &str = "ENGINE_ERROR";
}

/// A structured per-rule error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleError {
    /// Id of the rule the error belongs to
    pub rule_id: String,

    /// Human-readable message
    pub message: String,

    /// Stable machine-readable code (see [`codes`])
    pub code: String,

    /// Optional extra detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl RuleError {
    /// Create a new rule error
    pub fn new(rule_id: impl Into<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            message: message.into(),
            code: code.to_string(),
            details: None,
        }
    }

    /// Attach detail data
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Result of one batch or single-rule execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// True iff the error list is empty
    pub success: bool,

    /// Merged action results, if any rule applied
    pub result: Option<Value>,

    /// Ids of the rules that applied, in application order
    pub applied_rules: Vec<String>,

    /// Per-rule errors collected during the batch
    #[serde(default)]
    pub errors: Vec<RuleError>,

    /// Wall-clock execution time in milliseconds
    pub duration_ms: u64,

    /// Execution metadata (rules_evaluated, rules_applied, ...)
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl ExecutionResult {
    /// A successful result with no applied rules
    pub fn empty(duration_ms: u64) -> Self {
        Self {
            success: true,
            result: None,
            applied_rules: Vec::new(),
            errors: Vec::new(),
            duration_ms,
            metadata: HashMap::new(),
        }
    }

    /// A failed result carrying a single error
    pub fn failed(error: RuleError, duration_ms: u64) -> Self {
        Self {
            success: false,
            result: None,
            applied_rules: Vec::new(),
            errors: vec![error],
            duration_ms,
            metadata: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_result() {
        let result = ExecutionResult::empty(3);
        assert!(result.success);
        assert!(result.applied_rules.is_empty());
        assert!(result.result.is_none());
        assert_eq!(result.duration_ms, 3);
    }

    #[test]
    fn test_failed_result() {
        let result = ExecutionResult::failed(
            RuleError::new("r1", codes::RULE_NOT_FOUND, "no such rule"),
            1,
        );
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, codes::RULE_NOT_FOUND);
    }

    #[test]
    fn test_rule_error_details() {
        let err = RuleError::new("r1", codes::RULE_EXECUTION_ERROR, "boom")
            .with_details(Value::String("ctx".to_string()));
        assert!(err.details.is_some());

        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("RULE_EXECUTION_ERROR"));
    }
}
