//! Rule action definitions
//!
//! Actions are a closed tagged enum over the known action kinds. Generic
//! kinds are executed by the engine's action executor; retry and billing
//! kinds are interpreted by their decision policies. Externally loaded
//! definitions with an unrecognized kind land in [`RuleAction::Unknown`]
//! and are rejected at execution time.

use crate::types::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a discount value is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountKind {
    /// Percentage of the order amount
    Percentage,
    /// Literal amount in minor units
    FixedAmount,
    /// Free subscription period, no monetary effect
    FreePeriod,
}

impl DiscountKind {
    /// The wire-format name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountKind::Percentage => "PERCENTAGE",
            DiscountKind::FixedAmount => "FIXED_AMOUNT",
            DiscountKind::FreePeriod => "FREE_PERIOD",
        }
    }
}

/// How a billing amount adjustment is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentKind {
    /// Scale the current amount to this percentage
    Percentage,
    /// Subtract a fixed amount in minor units
    Fixed,
}

/// Backoff strategy for payment retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetryStrategy {
    /// base delay x attempt number
    Linear,
    /// base delay x multiplier^(attempt - 1)
    ExponentialBackoff,
    /// base delay regardless of attempt
    FixedInterval,
    /// Never retry
    None,
}

/// A single rule action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleAction {
    /// Set a field to a new value
    SetValue { field: String, value: Value },

    /// Compute a discount against the order amount
    CalculateDiscount { discount_kind: DiscountKind, value: f64 },

    /// Grant a free subscription period
    ApplyFreePeriod { period_days: u32 },

    /// Merge the supplied retry configuration fields over the working config
    OverrideRetryStrategy {
        #[serde(skip_serializing_if = "Option::is_none")]
        strategy: Option<RetryStrategy>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_retries: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        base_delay_minutes: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_delay_minutes: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        multiplier: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        escalate_after_attempts: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        notify_customer_after_attempts: Option<u32>,
    },

    /// Overwrite only the retry limit
    ExtendRetryLimit { max_retries: u32 },

    /// Terminal: no retry, with a reason
    ForceNoRetry { reason: String },

    /// Terminal: no retry, escalate to manual review immediately
    ImmediateEscalation { reason: String },

    /// Terminal: do not attempt the charge
    BlockBilling {
        reason: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        next_attempt_date: Option<DateTime<Utc>>,
    },

    /// Recompute the recommended charge amount
    AdjustAmount { adjustment: AdjustmentKind, value: f64 },

    /// Push the charge out by a number of days
    DelayBilling { delay_days: u32 },

    /// Catch-all for externally loaded action kinds this engine does not know
    Unknown {
        kind: String,
        #[serde(default)]
        params: HashMap<String, Value>,
    },
}

impl RuleAction {
    /// The wire-format kind tag for this action
    pub fn kind(&self) -> &str {
        match self {
            RuleAction::SetValue { .. } => "SET_VALUE",
            RuleAction::CalculateDiscount { .. } => "CALCULATE_DISCOUNT",
            RuleAction::ApplyFreePeriod { .. } => "APPLY_FREE_PERIOD",
            RuleAction::OverrideRetryStrategy { .. } => "OVERRIDE_RETRY_STRATEGY",
            RuleAction::ExtendRetryLimit { .. } => "EXTEND_RETRY_LIMIT",
            RuleAction::ForceNoRetry { .. } => "FORCE_NO_RETRY",
            RuleAction::ImmediateEscalation { .. } => "IMMEDIATE_ESCALATION",
            RuleAction::BlockBilling { .. } => "BLOCK_BILLING",
            RuleAction::AdjustAmount { .. } => "ADJUST_AMOUNT",
            RuleAction::DelayBilling { .. } => "DELAY_BILLING",
            RuleAction::Unknown { kind, .. } => kind,
        }
    }
}
