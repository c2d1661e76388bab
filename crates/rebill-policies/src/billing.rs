//! Billing decision policy
//!
//! Decides whether and how to attempt a scheduled charge using BILLING-type
//! rules, and exposes grace-period and proration helpers.

use crate::error::Result;
use rebill_core::error::CoreError;
use rebill_core::rule::{AdjustmentKind, Condition, ConditionOperator};
use rebill_core::{Money, Rule, RuleAction, RuleType, Value};
use rebill_engine::registry::{self, SharedRegistry};
use rebill_engine::{evaluator, ExecutionContext};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Facts about a scheduled charge
#[derive(Debug, Clone)]
pub struct BillingContext {
    pub subscription_id: String,
    pub customer_id: String,
    /// Amount scheduled to be charged
    pub amount: Money,
    /// When the charge is scheduled
    pub billing_date: DateTime<Utc>,
    pub past_due: bool,
    /// Consecutive failed attempts on this subscription
    pub failed_attempts: u32,
    /// Extra facts exposed to BILLING rules
    pub facts: HashMap<String, Value>,
}

impl BillingContext {
    /// Create a context for a scheduled charge
    pub fn new(
        subscription_id: impl Into<String>,
        customer_id: impl Into<String>,
        amount: Money,
        billing_date: DateTime<Utc>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            customer_id: customer_id.into(),
            amount,
            billing_date,
            past_due: false,
            failed_attempts: 0,
            facts: HashMap::new(),
        }
    }

    /// Mark the subscription past due
    pub fn past_due(mut self) -> Self {
        self.past_due = true;
        self
    }

    /// Record consecutive failed attempts
    pub fn with_failed_attempts(mut self, failed_attempts: u32) -> Self {
        self.failed_attempts = failed_attempts;
        self
    }

    /// Expose an extra fact to BILLING rules
    pub fn with_fact(mut self, key: impl Into<String>, value: Value) -> Self {
        self.facts.insert(key.into(), value);
        self
    }
}

/// Structured billing decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingDecision {
    pub should_attempt_billing: bool,
    /// Amount to charge after any adjustments
    pub recommended_amount: Money,
    /// Accumulated delay across all matching DELAY_BILLING rules
    pub delay_days: u32,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub reason: String,
    pub applied_rule_ids: Vec<String>,
}

/// Billing decision policy over a shared registry
pub struct BillingDecisionPolicy {
    registry: SharedRegistry,
}

impl BillingDecisionPolicy {
    /// Create the policy over a shared registry
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    /// Register the built-in BILLING rules
    pub fn register_default_rules(&self) -> Result<()> {
        let mut registry = registry::write_locked(&self.registry);

        registry.register_rule(
            Rule::new(
                "billing-block-excessive-failures",
                "Block After Excessive Failures",
                RuleType::Billing,
                vec![RuleAction::BlockBilling {
                    reason: "too many consecutive failed attempts, manual intervention required"
                        .to_string(),
                    next_attempt_date: None,
                }],
            )
            .with_priority(300)
            .terminal()
            .add_condition(Condition::new(
                "subscription.failed_attempts",
                ConditionOperator::GreaterOrEqual,
                Value::Number(3.0),
            )),
        )?;

        registry.register_rule(
            Rule::new(
                "billing-delay-past-due-small",
                "Delay Small Past-Due Charges",
                RuleType::Billing,
                vec![RuleAction::DelayBilling { delay_days: 3 }],
            )
            .with_priority(100)
            .add_condition(Condition::new(
                "subscription.past_due",
                ConditionOperator::Equals,
                Value::Bool(true),
            ))
            .add_condition(Condition::new(
                "invoice.amount",
                ConditionOperator::LessThan,
                Value::Number(1000.0),
            )),
        )?;

        Ok(())
    }

    /// Decide whether and how to attempt the scheduled charge.
    ///
    /// BLOCK_BILLING is terminal; ADJUST_AMOUNT recomputes the recommended
    /// amount and later rules may still fire; DELAY_BILLING accumulates the
    /// maximum requested delay across all matching rules.
    pub fn evaluate(&self, ctx: &BillingContext) -> BillingDecision {
        let exec_ctx = derive_rule_context(ctx);

        let mut recommended = ctx.amount.clone();
        let mut delay_days: u32 = 0;
        let mut applied_rule_ids = Vec::new();

        let registry = registry::read_locked(&self.registry);
        for rule in registry.get_enabled_rules_by_type(RuleType::Billing) {
            if !evaluator::evaluate_rule(rule, &exec_ctx) {
                continue;
            }
            applied_rule_ids.push(rule.id.clone());

            for action in &rule.actions {
                match action {
                    RuleAction::BlockBilling {
                        reason,
                        next_attempt_date,
                    } => {
                        tracing::debug!(
                            subscription_id = %ctx.subscription_id,
                            rule_id = %rule.id,
                            "billing blocked"
                        );
                        return BillingDecision {
                            should_attempt_billing: false,
                            recommended_amount: recommended,
                            delay_days,
                            next_attempt_at: *next_attempt_date,
                            reason: reason.clone(),
                            applied_rule_ids,
                        };
                    }
                    RuleAction::AdjustAmount { adjustment, value } => {
                        recommended = apply_adjustment(&recommended, *adjustment, *value);
                        tracing::debug!(
                            rule_id = %rule.id,
                            amount = recommended.amount,
                            "billing amount adjusted"
                        );
                    }
                    RuleAction::DelayBilling { delay_days: days } => {
                        delay_days = delay_days.max(*days);
                    }
                    other => {
                        tracing::debug!(
                            rule_id = %rule.id,
                            kind = other.kind(),
                            "ignoring non-billing action in BILLING rule"
                        );
                    }
                }
            }
        }

        let next_attempt_at =
            (delay_days > 0).then(|| ctx.billing_date + Duration::days(delay_days as i64));
        let reason = if delay_days > 0 {
            format!("billing delayed by {} days", delay_days)
        } else {
            "billing approved".to_string()
        };

        BillingDecision {
            should_attempt_billing: true,
            recommended_amount: recommended,
            delay_days,
            next_attempt_at,
            reason,
            applied_rule_ids,
        }
    }
}

/// End of the grace period following a billing failure
pub fn grace_period_end(failed_at: DateTime<Utc>, grace_days: u32) -> DateTime<Utc> {
    failed_at + Duration::days(grace_days as i64)
}

/// Prorated amount for a mid-cycle plan change.
///
/// Price difference scaled by the remaining share of the cycle. Downgrades
/// yield a negative amount (credit); this is the one place the non-negative
/// Money invariant is deliberately bypassed.
pub fn prorate_plan_change(
    old_price: &Money,
    new_price: &Money,
    remaining_days: u32,
    total_days: u32,
) -> Result<Money> {
    if old_price.currency != new_price.currency {
        return Err(CoreError::CurrencyMismatch {
            left: old_price.currency.clone(),
            right: new_price.currency.clone(),
        }
        .into());
    }
    if total_days == 0 {
        return Err(CoreError::InvalidValue("total_days must be positive".to_string()).into());
    }

    let difference = new_price.amount - old_price.amount;
    let prorated =
        (difference as f64 * remaining_days as f64 / total_days as f64).round() as i64;
    Ok(Money::signed(prorated, old_price.currency.clone()))
}

/// Recompute an amount under a PERCENTAGE or FIXED adjustment.
///
/// PERCENTAGE scales the current amount to the given percent; FIXED
/// subtracts minor units. Both floor at zero.
fn apply_adjustment(amount: &Money, adjustment: AdjustmentKind, value: f64) -> Money {
    match adjustment {
        AdjustmentKind::Percentage => amount.percentage(value),
        AdjustmentKind::Fixed => Money::signed(
            (amount.amount - value.round() as i64).max(0),
            amount.currency.clone(),
        ),
    }
}

/// Derived fact context the BILLING rules see
fn derive_rule_context(ctx: &BillingContext) -> ExecutionContext {
    let mut subscription = HashMap::new();
    subscription.insert("id".to_string(), Value::from(ctx.subscription_id.as_str()));
    subscription.insert("past_due".to_string(), Value::Bool(ctx.past_due));
    subscription.insert(
        "failed_attempts".to_string(),
        Value::from(ctx.failed_attempts),
    );

    let mut invoice = HashMap::new();
    invoice.insert("amount".to_string(), Value::Number(ctx.amount.amount as f64));
    invoice.insert(
        "currency".to_string(),
        Value::from(ctx.amount.currency.as_str()),
    );

    let mut billing = HashMap::new();
    billing.insert(
        "date".to_string(),
        Value::from(ctx.billing_date.to_rfc3339()),
    );

    let mut data = ctx.facts.clone();
    data.insert("subscription".to_string(), Value::Object(subscription));
    data.insert(
        "customer".to_string(),
        Value::Object(HashMap::from([(
            "id".to_string(),
            Value::from(ctx.customer_id.as_str()),
        )])),
    );
    data.insert("invoice".to_string(), Value::Object(invoice));
    data.insert("billing".to_string(), Value::Object(billing));

    ExecutionContext::new(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grace_period_end() {
        let failed_at = Utc::now();
        assert_eq!(
            grace_period_end(failed_at, 7),
            failed_at + Duration::days(7)
        );
    }

    #[test]
    fn test_prorate_upgrade_is_positive() {
        let old = Money::new(1000, "USD").unwrap();
        let new = Money::new(2000, "USD").unwrap();

        // Half the cycle remaining: owe half the difference
        let prorated = prorate_plan_change(&old, &new, 15, 30).unwrap();
        assert_eq!(prorated.amount, 500);
    }

    #[test]
    fn test_prorate_downgrade_is_negative_credit() {
        let old = Money::new(2000, "USD").unwrap();
        let new = Money::new(1000, "USD").unwrap();

        let prorated = prorate_plan_change(&old, &new, 15, 30).unwrap();
        assert_eq!(prorated.amount, -500);
    }

    #[test]
    fn test_prorate_rejects_zero_cycle() {
        let old = Money::new(1000, "USD").unwrap();
        let new = Money::new(2000, "USD").unwrap();
        assert!(prorate_plan_change(&old, &new, 0, 0).is_err());
    }

    #[test]
    fn test_prorate_rejects_currency_mismatch() {
        let old = Money::new(1000, "USD").unwrap();
        let new = Money::new(2000, "EUR").unwrap();
        assert!(prorate_plan_change(&old, &new, 10, 30).is_err());
    }

    #[test]
    fn test_apply_adjustment_percentage() {
        let amount = Money::new(1000, "USD").unwrap();
        let adjusted = apply_adjustment(&amount, AdjustmentKind::Percentage, 50.0);
        assert_eq!(adjusted.amount, 500);
    }

    #[test]
    fn test_apply_adjustment_fixed_floors_at_zero() {
        let amount = Money::new(100, "USD").unwrap();
        let adjusted = apply_adjustment(&amount, AdjustmentKind::Fixed, 250.0);
        assert_eq!(adjusted.amount, 0);
    }
}
