//! Execution context
//!
//! An `ExecutionContext` carries the observed facts a batch of rules is
//! evaluated against, plus the timestamp used to filter rules by validity
//! window.

use crate::field_lookup;
use rebill_core::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Facts and metadata for one rule evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Fact tree (nested key/value data)
    pub data: HashMap<String, Value>,

    /// Caller-supplied metadata, not visible to conditions
    #[serde(default)]
    pub metadata: HashMap<String, Value>,

    /// Trace id for correlating logs; generated when not supplied
    pub trace_id: String,

    /// Evaluation timestamp; rules outside their validity window at this
    /// instant are skipped
    pub timestamp: DateTime<Utc>,
}

impl ExecutionContext {
    /// Create a context from a fact tree, stamped now with a fresh trace id
    pub fn new(data: HashMap<String, Value>) -> Self {
        Self {
            data,
            metadata: HashMap::new(),
            trace_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Add a single top-level fact
    pub fn with_fact(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Attach caller metadata
    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Use a caller-supplied trace id
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self
    }

    /// Evaluate as of a specific instant instead of now
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Resolve a dot-separated field path against the fact tree.
    ///
    /// Returns `Value::Null` on any missing hop.
    pub fn get_field(&self, path: &str) -> Value {
        let segments: Vec<&str> = path.split('.').collect();
        field_lookup::get_nested_value(&self.data, &segments)
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_context() -> ExecutionContext {
        let mut customer = HashMap::new();
        customer.insert("tier".to_string(), Value::String("premium".to_string()));

        let mut data = HashMap::new();
        data.insert("amount".to_string(), Value::Number(1000.0));
        data.insert("customer".to_string(), Value::Object(customer));

        ExecutionContext::new(data)
    }

    #[test]
    fn test_context_get_field() {
        let ctx = create_test_context();

        assert_eq!(ctx.get_field("amount"), Value::Number(1000.0));
        assert_eq!(
            ctx.get_field("customer.tier"),
            Value::String("premium".to_string())
        );
        assert_eq!(ctx.get_field("customer.missing"), Value::Null);
        assert_eq!(ctx.get_field("missing.deeper"), Value::Null);
    }

    #[test]
    fn test_context_generates_trace_id() {
        let ctx = ExecutionContext::default();
        assert!(!ctx.trace_id.is_empty());

        let other = ExecutionContext::default();
        assert_ne!(ctx.trace_id, other.trace_id);
    }

    #[test]
    fn test_context_builder() {
        let ts = Utc::now() - chrono::Duration::days(3);
        let ctx = ExecutionContext::default()
            .with_fact("flag", Value::Bool(true))
            .with_trace_id("trace-1")
            .with_timestamp(ts);

        assert_eq!(ctx.get_field("flag"), Value::Bool(true));
        assert_eq!(ctx.trace_id, "trace-1");
        assert_eq!(ctx.timestamp, ts);
    }
}
