//! Retry decision policy
//!
//! Decides whether a failed payment should retry and when, starting from
//! per-category defaults and layering RETRY-type rule overrides on top.

use crate::error::Result;
use rebill_core::rule::{Condition, ConditionOperator, RetryStrategy};
use rebill_core::{Money, Rule, RuleAction, RuleType, Value};
use rebill_engine::registry::{self, SharedRegistry};
use rebill_engine::{evaluator, ExecutionContext};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Classification of a payment failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCategory {
    /// Transient failure, retry soon
    Retriable,
    /// Likely to clear after a longer wait (e.g. insufficient funds)
    DelayedRetry,
    /// Retrying cannot succeed (e.g. closed account)
    NonRetriable,
}

impl FailureCategory {
    /// The wire-format name of this category
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::Retriable => "RETRIABLE",
            FailureCategory::DelayedRetry => "DELAYED_RETRY",
            FailureCategory::NonRetriable => "NON_RETRIABLE",
        }
    }
}

/// Working retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub strategy: RetryStrategy,
    pub max_retries: u32,
    pub base_delay_minutes: i64,
    pub max_delay_minutes: i64,
    pub multiplier: f64,
    /// Escalate to manual review at this attempt; defaults to max_retries
    pub escalate_after_attempts: Option<u32>,
    /// Notify the customer at this attempt; defaults to 1
    pub notify_customer_after_attempts: Option<u32>,
}

impl RetryConfig {
    /// Built-in defaults per failure category
    pub fn default_for(category: FailureCategory) -> Self {
        match category {
            FailureCategory::Retriable => Self {
                strategy: RetryStrategy::ExponentialBackoff,
                max_retries: 4,
                base_delay_minutes: 5,
                max_delay_minutes: 1440,
                multiplier: 2.0,
                escalate_after_attempts: Some(3),
                notify_customer_after_attempts: Some(2),
            },
            FailureCategory::DelayedRetry => Self {
                strategy: RetryStrategy::FixedInterval,
                max_retries: 3,
                base_delay_minutes: 1440,
                max_delay_minutes: 4320,
                multiplier: 1.0,
                escalate_after_attempts: Some(2),
                notify_customer_after_attempts: Some(1),
            },
            FailureCategory::NonRetriable => Self {
                strategy: RetryStrategy::None,
                max_retries: 0,
                base_delay_minutes: 0,
                max_delay_minutes: 0,
                multiplier: 1.0,
                escalate_after_attempts: Some(1),
                notify_customer_after_attempts: Some(1),
            },
        }
    }
}

/// Facts about a failed payment
#[derive(Debug, Clone)]
pub struct RetryContext {
    pub payment_id: String,
    pub subscription_id: String,
    pub customer_id: String,
    /// 1-based number of the attempt that just failed
    pub attempt_number: u32,
    pub failure_category: FailureCategory,
    pub failure_code: Option<String>,
    pub failure_message: Option<String>,
    pub amount: Money,
    /// Extra facts exposed to RETRY rules
    pub facts: HashMap<String, Value>,
}

impl RetryContext {
    /// Create a context for a failed payment attempt
    pub fn new(
        payment_id: impl Into<String>,
        subscription_id: impl Into<String>,
        customer_id: impl Into<String>,
        attempt_number: u32,
        failure_category: FailureCategory,
        amount: Money,
    ) -> Self {
        Self {
            payment_id: payment_id.into(),
            subscription_id: subscription_id.into(),
            customer_id: customer_id.into(),
            attempt_number,
            failure_category,
            failure_code: None,
            failure_message: None,
            amount,
            facts: HashMap::new(),
        }
    }

    /// Attach the gateway failure code
    pub fn with_failure_code(mut self, code: impl Into<String>) -> Self {
        self.failure_code = Some(code.into());
        self
    }

    /// Attach the gateway failure message
    pub fn with_failure_message(mut self, message: impl Into<String>) -> Self {
        self.failure_message = Some(message.into());
        self
    }

    /// Expose an extra fact to RETRY rules
    pub fn with_fact(mut self, key: impl Into<String>, value: Value) -> Self {
        self.facts.insert(key.into(), value);
        self
    }
}

/// Structured retry decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryDecision {
    pub should_retry: bool,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub escalate_to_manual: bool,
    pub notify_customer: bool,
    pub reason: String,
    /// Strategy in effect after rule overrides
    pub strategy: RetryStrategy,
    /// Configuration in effect after rule overrides
    pub config: RetryConfig,
    pub applied_rule_ids: Vec<String>,
}

/// Terminal decision set by a blocking rule action; unset fields fall back
/// to the computed values
struct BlockingDecision {
    escalate: Option<bool>,
    notify: Option<bool>,
    reason: String,
}

/// Retry decision policy over a shared registry
pub struct RetryDecisionPolicy {
    registry: SharedRegistry,
}

impl RetryDecisionPolicy {
    /// Create the policy over a shared registry
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    /// Register the built-in RETRY rules
    pub fn register_default_rules(&self) -> Result<()> {
        let mut registry = registry::write_locked(&self.registry);

        registry.register_rule(
            Rule::new(
                "retry-fraud-escalation",
                "Suspected Fraud Escalation",
                RuleType::Retry,
                vec![RuleAction::ImmediateEscalation {
                    reason: "suspected fraud, manual review required".to_string(),
                }],
            )
            .with_priority(300)
            .add_condition(Condition::new(
                "failure.code",
                ConditionOperator::Equals,
                Value::from("fraud_suspected"),
            )),
        )?;

        registry.register_rule(
            Rule::new(
                "retry-card-expired",
                "Expired Card",
                RuleType::Retry,
                vec![RuleAction::ForceNoRetry {
                    reason: "payment method expired, waiting for customer update".to_string(),
                }],
            )
            .with_priority(200)
            .add_condition(Condition::new(
                "failure.code",
                ConditionOperator::Equals,
                Value::from("card_expired"),
            )),
        )?;

        registry.register_rule(
            Rule::new(
                "retry-high-value-extension",
                "High Value Retry Extension",
                RuleType::Retry,
                vec![RuleAction::ExtendRetryLimit { max_retries: 5 }],
            )
            .with_priority(100)
            .add_condition(Condition::new(
                "payment.amount",
                ConditionOperator::GreaterOrEqual,
                Value::Number(10_000.0),
            )),
        )?;

        Ok(())
    }

    /// Decide whether and when to retry a failed payment.
    ///
    /// Starts from the category default, applies RETRY rules in descending
    /// priority, and stops at the first blocking action; the highest
    /// priority blocking rule wins outright.
    pub fn evaluate(&self, ctx: &RetryContext) -> RetryDecision {
        let mut config = RetryConfig::default_for(ctx.failure_category);
        let exec_ctx = derive_rule_context(ctx);
        let now = exec_ctx.timestamp;

        let mut applied_rule_ids = Vec::new();
        let mut blocking: Option<BlockingDecision> = None;

        {
            let registry = registry::read_locked(&self.registry);
            'rules: for rule in registry.get_enabled_rules_by_type(RuleType::Retry) {
                if !evaluator::evaluate_rule(rule, &exec_ctx) {
                    continue;
                }
                applied_rule_ids.push(rule.id.clone());

                for action in &rule.actions {
                    match action {
                        RuleAction::OverrideRetryStrategy {
                            strategy,
                            max_retries,
                            base_delay_minutes,
                            max_delay_minutes,
                            multiplier,
                            escalate_after_attempts,
                            notify_customer_after_attempts,
                        } => {
                            // Merge only the supplied fields
                            if let Some(s) = strategy {
                                config.strategy = *s;
                            }
                            if let Some(m) = max_retries {
                                config.max_retries = *m;
                            }
                            if let Some(b) = base_delay_minutes {
                                config.base_delay_minutes = *b;
                            }
                            if let Some(m) = max_delay_minutes {
                                config.max_delay_minutes = *m;
                            }
                            if let Some(m) = multiplier {
                                config.multiplier = *m;
                            }
                            if let Some(e) = escalate_after_attempts {
                                config.escalate_after_attempts = Some(*e);
                            }
                            if let Some(n) = notify_customer_after_attempts {
                                config.notify_customer_after_attempts = Some(*n);
                            }
                        }
                        RuleAction::ExtendRetryLimit { max_retries } => {
                            config.max_retries = *max_retries;
                        }
                        RuleAction::ForceNoRetry { reason } => {
                            blocking = Some(BlockingDecision {
                                escalate: Some(false),
                                notify: Some(true),
                                reason: reason.clone(),
                            });
                            break 'rules;
                        }
                        RuleAction::ImmediateEscalation { reason } => {
                            blocking = Some(BlockingDecision {
                                escalate: Some(true),
                                notify: Some(true),
                                reason: reason.clone(),
                            });
                            break 'rules;
                        }
                        other => {
                            tracing::debug!(
                                rule_id = %rule.id,
                                kind = other.kind(),
                                "ignoring non-retry action in RETRY rule"
                            );
                        }
                    }
                }
            }
        }

        let attempt = ctx.attempt_number;
        let computed_escalate =
            attempt >= config.escalate_after_attempts.unwrap_or(config.max_retries);
        let computed_notify =
            attempt >= config.notify_customer_after_attempts.unwrap_or(1);

        if let Some(block) = blocking {
            // Blocking fields override the computed values
            return RetryDecision {
                should_retry: false,
                next_retry_at: None,
                escalate_to_manual: block.escalate.unwrap_or(computed_escalate),
                notify_customer: block.notify.unwrap_or(computed_notify),
                reason: block.reason,
                strategy: config.strategy,
                config,
                applied_rule_ids,
            };
        }

        let should_retry =
            attempt < config.max_retries && config.strategy != RetryStrategy::None;
        let next_retry_at =
            should_retry.then(|| calculate_next_retry_time(attempt, &config, now));

        let reason = if should_retry {
            format!(
                "attempt {} of {} failed, retry scheduled",
                attempt, config.max_retries
            )
        } else if config.strategy == RetryStrategy::None {
            "failure category does not permit retries".to_string()
        } else {
            format!("retry limit of {} reached", config.max_retries)
        };

        tracing::debug!(
            payment_id = %ctx.payment_id,
            should_retry,
            escalate = computed_escalate,
            "retry decision computed"
        );

        RetryDecision {
            should_retry,
            next_retry_at,
            escalate_to_manual: computed_escalate,
            notify_customer: computed_notify,
            reason,
            strategy: config.strategy,
            config,
            applied_rule_ids,
        }
    }
}

/// Next retry instant under the backoff formula.
///
/// LINEAR: base x attempt; EXPONENTIAL_BACKOFF: base x multiplier^(attempt-1);
/// FIXED_INTERVAL: base. The delay is clamped to `max_delay_minutes` before
/// being added to `now`.
pub fn calculate_next_retry_time(
    attempt_number: u32,
    config: &RetryConfig,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let delay_minutes = match config.strategy {
        RetryStrategy::Linear => config.base_delay_minutes * attempt_number as i64,
        RetryStrategy::ExponentialBackoff => {
            let factor = config.multiplier.powi(attempt_number.saturating_sub(1) as i32);
            (config.base_delay_minutes as f64 * factor).round() as i64
        }
        RetryStrategy::FixedInterval => config.base_delay_minutes,
        RetryStrategy::None => 0,
    };

    let clamped = delay_minutes.min(config.max_delay_minutes);
    now + Duration::minutes(clamped)
}

/// Derived fact context the RETRY rules see
fn derive_rule_context(ctx: &RetryContext) -> ExecutionContext {
    let mut payment = HashMap::new();
    payment.insert("id".to_string(), Value::from(ctx.payment_id.as_str()));
    payment.insert("amount".to_string(), Value::Number(ctx.amount.amount as f64));
    payment.insert(
        "currency".to_string(),
        Value::from(ctx.amount.currency.as_str()),
    );

    let mut failure = HashMap::new();
    failure.insert(
        "category".to_string(),
        Value::from(ctx.failure_category.as_str()),
    );
    if let Some(code) = &ctx.failure_code {
        failure.insert("code".to_string(), Value::from(code.as_str()));
    }
    if let Some(message) = &ctx.failure_message {
        failure.insert("message".to_string(), Value::from(message.as_str()));
    }

    let mut attempt = HashMap::new();
    attempt.insert("number".to_string(), Value::from(ctx.attempt_number));

    let mut data = ctx.facts.clone();
    data.insert("payment".to_string(), Value::Object(payment));
    data.insert(
        "subscription".to_string(),
        Value::Object(HashMap::from([(
            "id".to_string(),
            Value::from(ctx.subscription_id.as_str()),
        )])),
    );
    data.insert(
        "customer".to_string(),
        Value::Object(HashMap::from([(
            "id".to_string(),
            Value::from(ctx.customer_id.as_str()),
        )])),
    );
    data.insert("failure".to_string(), Value::Object(failure));
    data.insert("attempt".to_string(), Value::Object(attempt));

    ExecutionContext::new(data)
}
