//! Action execution
//!
//! Stateless dispatch on an action's kind, producing a `Value` describing
//! what the action did. Only the generic kinds are executable here; retry
//! and billing kinds are interpreted by their decision policies and reaching
//! this executor with one is an error.

use crate::context::ExecutionContext;
use crate::error::{EngineError, Result};
use rebill_core::rule::DiscountKind;
use rebill_core::{Rule, RuleAction, Value};
use std::collections::HashMap;

/// Fact path the CALCULATE_DISCOUNT action reads its base amount from
const ORDER_AMOUNT_FIELD: &str = "order.amount";

/// Execute all actions of a rule.
///
/// A rule with exactly one action returns that action's bare result; a rule
/// with multiple actions returns an ordered list of per-action results. The
/// asymmetry is load-bearing: downstream consumers pattern-match on it.
pub fn execute_actions(rule: &Rule, ctx: &ExecutionContext) -> Result<Value> {
    let mut outcomes = Vec::with_capacity(rule.actions.len());
    for action in &rule.actions {
        outcomes.push(execute_action(action, ctx)?);
    }

    if outcomes.len() == 1 {
        Ok(outcomes.into_iter().next().unwrap_or(Value::Null))
    } else {
        Ok(Value::Array(outcomes))
    }
}

/// Execute a single action
pub fn execute_action(action: &RuleAction, ctx: &ExecutionContext) -> Result<Value> {
    match action {
        RuleAction::SetValue { field, value } => {
            let original = ctx.get_field(field);
            let mut out = HashMap::new();
            out.insert("action".to_string(), Value::from(action.kind()));
            out.insert("field".to_string(), Value::from(field.as_str()));
            out.insert("new_value".to_string(), value.clone());
            out.insert("original_value".to_string(), original);
            Ok(Value::Object(out))
        }

        RuleAction::CalculateDiscount {
            discount_kind,
            value,
        } => {
            let original_amount = ctx
                .get_field(ORDER_AMOUNT_FIELD)
                .as_f64()
                .unwrap_or(0.0);
            let discount_amount = match discount_kind {
                DiscountKind::Percentage => (original_amount * value / 100.0).round(),
                DiscountKind::FixedAmount => *value,
                DiscountKind::FreePeriod => 0.0,
            };

            let mut out = HashMap::new();
            out.insert("action".to_string(), Value::from(action.kind()));
            out.insert("original_amount".to_string(), Value::Number(original_amount));
            out.insert("discount_amount".to_string(), Value::Number(discount_amount));
            out.insert(
                "final_amount".to_string(),
                Value::Number(original_amount - discount_amount),
            );
            out.insert(
                "discount_kind".to_string(),
                Value::from(discount_kind.as_str()),
            );
            out.insert("discount_value".to_string(), Value::Number(*value));
            Ok(Value::Object(out))
        }

        RuleAction::ApplyFreePeriod { period_days } => {
            let mut out = HashMap::new();
            out.insert("action".to_string(), Value::from(action.kind()));
            out.insert("period_days".to_string(), Value::from(*period_days));
            out.insert(
                "applied_at".to_string(),
                Value::from(ctx.timestamp.to_rfc3339()),
            );
            Ok(Value::Object(out))
        }

        // Retry and billing kinds belong to their policies, and Unknown is
        // by definition not executable
        other => Err(EngineError::UnknownActionKind(other.kind().to_string())),
    }
}
