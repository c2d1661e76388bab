//! Integration tests for retry decisioning

use rebill_core::rule::{Condition, ConditionOperator, RetryStrategy};
use rebill_core::{Money, Rule, RuleAction, RuleType, Value};
use rebill_engine::registry::SharedRegistry;
use rebill_engine::RuleRegistry;
use rebill_policies::{FailureCategory, RetryContext, RetryDecisionPolicy};

fn shared_registry() -> SharedRegistry {
    RuleRegistry::new().into_shared()
}

fn usd(amount: i64) -> Money {
    Money::new(amount, "USD").unwrap()
}

fn failed_payment(attempt: u32, category: FailureCategory) -> RetryContext {
    RetryContext::new("pay-1", "sub-1", "cust-1", attempt, category, usd(2500))
}

/// Rule that pins the working config to LINEAR, 3 retries, 5 minute base
fn linear_override_rule() -> Rule {
    Rule::new(
        "retry-linear-override",
        "Linear Override",
        RuleType::Retry,
        vec![RuleAction::OverrideRetryStrategy {
            strategy: Some(RetryStrategy::Linear),
            max_retries: Some(3),
            base_delay_minutes: Some(5),
            max_delay_minutes: None,
            multiplier: None,
            escalate_after_attempts: None,
            notify_customer_after_attempts: None,
        }],
    )
    .with_priority(100)
}

// ========== Category Defaults ==========

#[test]
fn test_retriable_failure_schedules_retry() {
    let policy = RetryDecisionPolicy::new(shared_registry());
    let decision = policy.evaluate(&failed_payment(1, FailureCategory::Retriable));

    assert!(decision.should_retry);
    assert!(decision.next_retry_at.is_some());
    assert!(!decision.escalate_to_manual);
    assert!(decision.applied_rule_ids.is_empty());
}

#[test]
fn test_non_retriable_failure_escalates_and_notifies() {
    let policy = RetryDecisionPolicy::new(shared_registry());
    let decision = policy.evaluate(&failed_payment(1, FailureCategory::NonRetriable));

    assert!(!decision.should_retry);
    assert!(decision.next_retry_at.is_none());
    assert!(decision.escalate_to_manual);
    assert!(decision.notify_customer);
}

#[test]
fn test_retry_limit_reached() {
    let policy = RetryDecisionPolicy::new(shared_registry());
    // Retriable default allows 4 retries
    let decision = policy.evaluate(&failed_payment(4, FailureCategory::Retriable));

    assert!(!decision.should_retry);
    assert!(decision.reason.contains("limit"));
    assert!(decision.escalate_to_manual);
}

#[test]
fn test_delayed_retry_uses_fixed_interval() {
    let policy = RetryDecisionPolicy::new(shared_registry());
    let ctx = failed_payment(1, FailureCategory::DelayedRetry);
    let before = chrono::Utc::now();
    let decision = policy.evaluate(&ctx);

    assert!(decision.should_retry);
    assert_eq!(decision.strategy, RetryStrategy::FixedInterval);
    // Fixed interval default is one day out
    let next = decision.next_retry_at.unwrap();
    let delay = next - before;
    assert!((delay.num_minutes() - 1440).abs() <= 1);
}

// ========== Rule Overrides ==========

#[test]
fn test_override_rule_merges_supplied_fields_only() {
    let registry = shared_registry();
    {
        let mut guard = registry.write().unwrap();
        guard.register_rule(linear_override_rule()).unwrap();
    }
    let policy = RetryDecisionPolicy::new(registry);

    let before = chrono::Utc::now();
    let decision = policy.evaluate(&failed_payment(1, FailureCategory::Retriable));

    assert!(decision.should_retry);
    assert_eq!(decision.strategy, RetryStrategy::Linear);
    assert_eq!(decision.config.max_retries, 3);
    assert_eq!(decision.config.base_delay_minutes, 5);
    // Fields the override left unset keep the category default
    assert_eq!(decision.config.max_delay_minutes, 1440);
    assert_eq!(decision.applied_rule_ids, vec!["retry-linear-override"]);

    // Linear backoff, attempt 1: about five minutes out
    let next = decision.next_retry_at.unwrap();
    let delay = next - before;
    assert!((delay.num_minutes() - 5).abs() <= 1);
}

#[test]
fn test_extend_retry_limit_overwrites_max_retries() {
    let registry = shared_registry();
    {
        let mut guard = registry.write().unwrap();
        guard
            .register_rule(Rule::new(
                "retry-extend",
                "Extend",
                RuleType::Retry,
                vec![RuleAction::ExtendRetryLimit { max_retries: 6 }],
            ))
            .unwrap();
    }
    let policy = RetryDecisionPolicy::new(registry);

    // Attempt 4 would exhaust the default limit of 4; the extension keeps
    // retries flowing
    let decision = policy.evaluate(&failed_payment(4, FailureCategory::Retriable));
    assert!(decision.should_retry);
    assert_eq!(decision.config.max_retries, 6);
}

#[test]
fn test_highest_priority_blocking_rule_wins() {
    let registry = shared_registry();
    {
        let mut guard = registry.write().unwrap();
        guard
            .register_rule(
                Rule::new(
                    "block-low",
                    "Low Priority Block",
                    RuleType::Retry,
                    vec![RuleAction::ForceNoRetry {
                        reason: "low priority block".to_string(),
                    }],
                )
                .with_priority(10),
            )
            .unwrap();
        guard
            .register_rule(
                Rule::new(
                    "block-high",
                    "High Priority Block",
                    RuleType::Retry,
                    vec![RuleAction::ImmediateEscalation {
                        reason: "high priority escalation".to_string(),
                    }],
                )
                .with_priority(200),
            )
            .unwrap();
    }
    let policy = RetryDecisionPolicy::new(registry);

    let decision = policy.evaluate(&failed_payment(1, FailureCategory::Retriable));
    assert!(!decision.should_retry);
    assert!(decision.escalate_to_manual);
    assert_eq!(decision.reason, "high priority escalation");
    // The lower priority blocking rule never ran
    assert_eq!(decision.applied_rule_ids, vec!["block-high"]);
}

// ========== Default Rules ==========

#[test]
fn test_card_expired_forces_no_retry() {
    let registry = shared_registry();
    let policy = RetryDecisionPolicy::new(registry);
    policy.register_default_rules().unwrap();

    let ctx = failed_payment(1, FailureCategory::Retriable).with_failure_code("card_expired");
    let decision = policy.evaluate(&ctx);

    assert!(!decision.should_retry);
    assert!(!decision.escalate_to_manual);
    assert!(decision.notify_customer);
    assert!(decision.reason.contains("expired"));
}

#[test]
fn test_fraud_suspicion_escalates_immediately() {
    let registry = shared_registry();
    let policy = RetryDecisionPolicy::new(registry);
    policy.register_default_rules().unwrap();

    let ctx = failed_payment(1, FailureCategory::Retriable).with_failure_code("fraud_suspected");
    let decision = policy.evaluate(&ctx);

    assert!(!decision.should_retry);
    assert!(decision.escalate_to_manual);
    assert!(decision.notify_customer);
}

#[test]
fn test_high_value_payment_extends_limit() {
    let registry = shared_registry();
    let policy = RetryDecisionPolicy::new(registry);
    policy.register_default_rules().unwrap();

    let ctx = RetryContext::new(
        "pay-1",
        "sub-1",
        "cust-1",
        4,
        FailureCategory::Retriable,
        usd(50_000),
    );
    let decision = policy.evaluate(&ctx);

    // Default limit is 4; the high-value rule extends it to 5
    assert!(decision.should_retry);
    assert_eq!(decision.config.max_retries, 5);
    assert!(decision
        .applied_rule_ids
        .contains(&"retry-high-value-extension".to_string()));
}

#[test]
fn test_unmatched_default_rules_leave_defaults() {
    let registry = shared_registry();
    let policy = RetryDecisionPolicy::new(registry);
    policy.register_default_rules().unwrap();

    let ctx = failed_payment(1, FailureCategory::Retriable).with_failure_code("card_declined");
    let decision = policy.evaluate(&ctx);

    assert!(decision.should_retry);
    assert_eq!(decision.config.max_retries, 4);
    assert!(decision.applied_rule_ids.is_empty());
}

// ========== Custom Facts ==========

#[test]
fn test_rules_can_condition_on_extra_facts() {
    let registry = shared_registry();
    {
        let mut guard = registry.write().unwrap();
        guard
            .register_rule(
                Rule::new(
                    "retry-vip-block",
                    "VIP Manual Handling",
                    RuleType::Retry,
                    vec![RuleAction::ImmediateEscalation {
                        reason: "vip accounts are handled manually".to_string(),
                    }],
                )
                .with_priority(500)
                .add_condition(Condition::new(
                    "customer_profile.vip",
                    ConditionOperator::Equals,
                    Value::Bool(true),
                )),
            )
            .unwrap();
    }
    let policy = RetryDecisionPolicy::new(registry);

    let ctx = failed_payment(1, FailureCategory::Retriable).with_fact(
        "customer_profile",
        Value::Object(std::collections::HashMap::from([(
            "vip".to_string(),
            Value::Bool(true),
        )])),
    );
    let decision = policy.evaluate(&ctx);

    assert!(!decision.should_retry);
    assert!(decision.escalate_to_manual);
}
