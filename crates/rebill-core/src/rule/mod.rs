//! Rule definitions

pub mod action;
pub mod condition;

pub use action::{AdjustmentKind, DiscountKind, RetryStrategy, RuleAction};
pub use condition::{Condition, ConditionOperator, ValueKind};

use crate::error::{CoreError, Result};
use crate::types::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Domain a rule belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    Pricing,
    Promotion,
    Retry,
    Refund,
    Billing,
}

impl RuleType {
    /// All known rule types
    pub const ALL: [RuleType; 5] = [
        RuleType::Pricing,
        RuleType::Promotion,
        RuleType::Retry,
        RuleType::Refund,
        RuleType::Billing,
    ];
}

/// A named, prioritized, conditionally-triggered unit of business logic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique rule ID
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Domain this rule belongs to
    pub rule_type: RuleType,

    /// Higher priority rules are evaluated first
    #[serde(default)]
    pub priority: u32,

    /// Conditions, AND-combined
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Actions executed when the rule matches (at least one)
    pub actions: Vec<RuleAction>,

    /// A terminal rule stops further rule evaluation in the same batch
    #[serde(default)]
    pub terminal: bool,

    /// Disabled rules are never evaluated
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Start of the validity window (inclusive; unbounded if absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,

    /// End of the validity window (inclusive; unbounded if absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<DateTime<Utc>>,

    /// Free-form metadata (e.g. "fail_fast" to abort the batch on error)
    #[serde(default)]
    pub metadata: HashMap<String, Value>,

    /// Definition version
    #[serde(default = "default_version")]
    pub version: u32,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

fn default_version() -> u32 {
    1
}

impl Rule {
    /// Create a new enabled rule with a single action
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        rule_type: RuleType,
        actions: Vec<RuleAction>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            rule_type,
            priority: 0,
            conditions: Vec::new(),
            actions,
            terminal: false,
            enabled: true,
            valid_from: None,
            valid_to: None,
            metadata: HashMap::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Add a condition
    pub fn add_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Replace the condition list
    pub fn with_conditions(mut self, conditions: Vec<Condition>) -> Self {
        self.conditions = conditions;
        self
    }

    /// Mark the rule as terminal
    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }

    /// Enable or disable the rule
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the validity window (either side may be unbounded)
    pub fn with_validity(
        mut self,
        valid_from: Option<DateTime<Utc>>,
        valid_to: Option<DateTime<Utc>>,
    ) -> Self {
        self.valid_from = valid_from;
        self.valid_to = valid_to;
        self
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Returns true if the rule's validity window contains `at`.
    ///
    /// Bounds are inclusive; a missing bound is unbounded on that side.
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        if let Some(from) = self.valid_from {
            if at < from {
                return false;
            }
        }
        if let Some(to) = self.valid_to {
            if at > to {
                return false;
            }
        }
        true
    }

    /// Check all structural invariants of the definition.
    ///
    /// Priority is `u32`, so a negative priority is unrepresentable and needs
    /// no check here.
    pub fn validate(&self) -> Result<()> {
        self.check_invariants().map_err(|err| {
            log::debug!("rule '{}' failed validation: {}", self.id, err);
            err
        })
    }

    fn check_invariants(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(CoreError::InvalidRule {
                field: "id".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidRule {
                field: "name".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.actions.is_empty() {
            return Err(CoreError::InvalidRule {
                field: "actions".to_string(),
                reason: "at least one action is required".to_string(),
            });
        }
        for (i, condition) in self.conditions.iter().enumerate() {
            if condition.field.trim().is_empty() {
                return Err(CoreError::InvalidRule {
                    field: format!("conditions[{}].field", i),
                    reason: "must not be empty".to_string(),
                });
            }
        }
        for (i, action) in self.actions.iter().enumerate() {
            if let RuleAction::Unknown { kind, params } = action {
                if kind.trim().is_empty() {
                    return Err(CoreError::InvalidRule {
                        field: format!("actions[{}].kind", i),
                        reason: "must not be empty".to_string(),
                    });
                }
                if params.is_empty() {
                    return Err(CoreError::InvalidRule {
                        field: format!("actions[{}].params", i),
                        reason: "must not be empty".to_string(),
                    });
                }
            }
        }
        if let (Some(from), Some(to)) = (self.valid_from, self.valid_to) {
            if from > to {
                return Err(CoreError::InvalidRule {
                    field: "valid_from".to_string(),
                    reason: "must not be after valid_to".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_action() -> RuleAction {
        RuleAction::SetValue {
            field: "flag".to_string(),
            value: Value::Bool(true),
        }
    }

    #[test]
    fn test_rule_builder() {
        let rule = Rule::new("r1", "Rule One", RuleType::Promotion, vec![sample_action()])
            .with_priority(50)
            .add_condition(Condition::new(
                "amount",
                ConditionOperator::GreaterThan,
                Value::Number(100.0),
            ))
            .terminal();

        assert_eq!(rule.id, "r1");
        assert_eq!(rule.priority, 50);
        assert!(rule.terminal);
        assert!(rule.enabled);
        assert_eq!(rule.conditions.len(), 1);
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn test_rule_empty_id_fails_validation() {
        let rule = Rule::new("", "Name", RuleType::Retry, vec![sample_action()]);
        assert!(rule.validate().is_err());
    }

    #[test]
    fn test_rule_empty_name_fails_validation() {
        let rule = Rule::new("id", "  ", RuleType::Retry, vec![sample_action()]);
        assert!(rule.validate().is_err());
    }

    #[test]
    fn test_rule_no_actions_fails_validation() {
        let rule = Rule::new("id", "Name", RuleType::Billing, vec![]);
        assert!(rule.validate().is_err());
    }

    #[test]
    fn test_rule_empty_condition_field_fails_validation() {
        let rule = Rule::new("id", "Name", RuleType::Billing, vec![sample_action()])
            .add_condition(Condition::new("", ConditionOperator::Equals, Value::Null));
        assert!(rule.validate().is_err());
    }

    #[test]
    fn test_rule_unknown_action_invariants() {
        let rule = Rule::new(
            "id",
            "Name",
            RuleType::Billing,
            vec![RuleAction::Unknown {
                kind: String::new(),
                params: HashMap::new(),
            }],
        );
        assert!(rule.validate().is_err());

        let rule = Rule::new(
            "id",
            "Name",
            RuleType::Billing,
            vec![RuleAction::Unknown {
                kind: "CUSTOM".to_string(),
                params: HashMap::new(),
            }],
        );
        assert!(rule.validate().is_err());
    }

    #[test]
    fn test_rule_inverted_window_fails_validation() {
        let from = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

        let rule = Rule::new("id", "Name", RuleType::Promotion, vec![sample_action()])
            .with_validity(Some(from), Some(to));
        assert!(rule.validate().is_err());
    }

    #[test]
    fn test_rule_validity_window_inclusive() {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();

        let rule = Rule::new("id", "Name", RuleType::Promotion, vec![sample_action()])
            .with_validity(Some(from), Some(to));

        assert!(rule.is_valid_at(from));
        assert!(rule.is_valid_at(to));
        assert!(!rule.is_valid_at(from - chrono::Duration::seconds(1)));
        assert!(!rule.is_valid_at(to + chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_rule_unbounded_window() {
        let rule = Rule::new("id", "Name", RuleType::Promotion, vec![sample_action()]);
        assert!(rule.is_valid_at(Utc::now()));

        let to = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let rule = rule.with_validity(None, Some(to));
        assert!(rule.is_valid_at(to - chrono::Duration::days(10_000)));
    }

    #[test]
    fn test_rule_serde_roundtrip() {
        let rule = Rule::new("r1", "Rule One", RuleType::Retry, vec![sample_action()])
            .with_priority(10)
            .with_metadata("fail_fast", Value::Bool(true));

        let json = serde_json::to_string(&rule).unwrap();
        assert!(json.contains("RETRY"));

        let back: Rule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rule);
    }
}
