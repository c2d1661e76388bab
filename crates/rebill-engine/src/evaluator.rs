//! Condition evaluation
//!
//! Stateless functions deciding whether a rule's condition set matches a
//! fact context. A type-mismatched comparison evaluates to false, never an
//! error, so partial or malformed fact trees degrade gracefully.

use crate::context::ExecutionContext;
use rebill_core::rule::{Condition, ConditionOperator, ValueKind};
use rebill_core::{Rule, Value};
use chrono::{DateTime, Utc};

/// Full rule check: enabled, inside its validity window at the context
/// timestamp, and every condition matches (logical AND, short-circuit).
pub fn evaluate_rule(rule: &Rule, ctx: &ExecutionContext) -> bool {
    if !rule.enabled {
        tracing::debug!(rule_id = %rule.id, "rule disabled, skipping");
        return false;
    }
    if !rule.is_valid_at(ctx.timestamp) {
        tracing::debug!(rule_id = %rule.id, "rule outside validity window, skipping");
        return false;
    }
    matches_conditions(rule, ctx)
}

/// Condition-only check, ignoring enabled flag and validity window.
///
/// Used by the single-rule execution path, which applies its own
/// enabled/disabled handling.
pub fn matches_conditions(rule: &Rule, ctx: &ExecutionContext) -> bool {
    rule.conditions
        .iter()
        .all(|condition| matches_condition(condition, ctx))
}

/// Evaluate one condition against the fact tree
pub fn matches_condition(condition: &Condition, ctx: &ExecutionContext) -> bool {
    let fact = ctx.get_field(&condition.field);
    let expected = &condition.value;

    match condition.operator {
        ConditionOperator::Equals => fact == *expected,
        ConditionOperator::NotEquals => !fact.is_null() && fact != *expected,
        ConditionOperator::GreaterThan => {
            compare_ordering(&fact, expected, condition.value_kind)
                .map(|ord| ord == std::cmp::Ordering::Greater)
                .unwrap_or(false)
        }
        ConditionOperator::LessThan => compare_ordering(&fact, expected, condition.value_kind)
            .map(|ord| ord == std::cmp::Ordering::Less)
            .unwrap_or(false),
        ConditionOperator::GreaterOrEqual => {
            compare_ordering(&fact, expected, condition.value_kind)
                .map(|ord| ord != std::cmp::Ordering::Less)
                .unwrap_or(false)
        }
        ConditionOperator::LessOrEqual => {
            compare_ordering(&fact, expected, condition.value_kind)
                .map(|ord| ord != std::cmp::Ordering::Greater)
                .unwrap_or(false)
        }
        ConditionOperator::Contains => match fact.as_array() {
            Some(items) => items.contains(expected),
            None => false,
        },
        ConditionOperator::NotContains => match fact.as_array() {
            Some(items) => !items.contains(expected),
            None => false,
        },
        ConditionOperator::In => match expected.as_array() {
            Some(items) => items.contains(&fact),
            None => false,
        },
        ConditionOperator::NotIn => match expected.as_array() {
            Some(items) => !fact.is_null() && !items.contains(&fact),
            None => false,
        },
        ConditionOperator::Regex => match (fact.as_str(), expected.as_str()) {
            (Some(haystack), Some(pattern)) => match regex::Regex::new(pattern) {
                Ok(re) => re.is_match(haystack),
                Err(err) => {
                    tracing::warn!(%pattern, %err, "invalid regex in condition, treating as no match");
                    false
                }
            },
            _ => false,
        },
    }
}

/// Ordering for GREATER_THAN/LESS_THAN/... comparisons.
///
/// Numbers compare numerically. Strings compare as dates when the DATE hint
/// is present (parsed via chrono) or when both sides parse as RFC 3339
/// instants. Anything else has no ordering.
fn compare_ordering(
    fact: &Value,
    expected: &Value,
    kind: Option<ValueKind>,
) -> Option<std::cmp::Ordering> {
    match (fact, expected) {
        (Value::Number(l), Value::Number(r)) => l.partial_cmp(r),
        (Value::String(l), Value::String(r)) => {
            if kind == Some(ValueKind::Date) {
                let left = parse_date(l)?;
                let right = parse_date(r)?;
                Some(left.cmp(&right))
            } else if let (Some(left), Some(right)) = (parse_date(l), parse_date(r)) {
                Some(left.cmp(&right))
            } else {
                None
            }
        }
        _ => None,
    }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}
