//! Rule condition definitions

use crate::types::Value;
use serde::{Deserialize, Serialize};

/// Comparison operators available in rule conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionOperator {
    /// Strict value equality
    Equals,
    /// Strict value inequality
    NotEquals,
    /// Numeric or date ordering
    GreaterThan,
    /// Numeric or date ordering
    LessThan,
    /// Numeric or date ordering
    GreaterOrEqual,
    /// Numeric or date ordering
    LessOrEqual,
    /// Comparison value is a member of the (list) fact
    Contains,
    /// Comparison value is not a member of the (list) fact
    NotContains,
    /// The (scalar) fact is a member of the comparison value list
    In,
    /// The (scalar) fact is not a member of the comparison value list
    NotIn,
    /// The (string) fact matches the comparison value pattern
    Regex,
}

/// Optional hint for how the comparison value should be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueKind {
    String,
    Number,
    Boolean,
    Date,
    List,
}

/// A single rule condition
///
/// Conditions within a rule are AND-combined; a rule matches only when every
/// condition matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Dot-separated path into the fact tree (e.g. "customer.tier")
    pub field: String,

    /// Comparison operator
    pub operator: ConditionOperator,

    /// Value to compare against
    pub value: Value,

    /// Optional interpretation hint for the comparison
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_kind: Option<ValueKind>,
}

impl Condition {
    /// Create a new condition
    pub fn new(field: impl Into<String>, operator: ConditionOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
            value_kind: None,
        }
    }

    /// Set the value-kind hint
    pub fn with_value_kind(mut self, kind: ValueKind) -> Self {
        self.value_kind = Some(kind);
        self
    }

    /// Split the field into path segments
    pub fn field_path(&self) -> Vec<String> {
        self.field.split('.').map(|s| s.to_string()).collect()
    }
}
