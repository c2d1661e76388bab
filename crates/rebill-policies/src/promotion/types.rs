//! Promotion stacking types

use rebill_core::rule::DiscountKind;
use rebill_core::{Money, Value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Descriptor for one promotion code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionCode {
    /// The code customers enter (e.g. "SUMMER10")
    pub code: String,

    /// Human-readable name
    pub name: String,

    /// How the discount value is interpreted
    pub discount_kind: DiscountKind,

    /// Percentage points or minor units, depending on the kind
    pub value: f64,

    /// Higher priority promotions apply first
    #[serde(default)]
    pub priority: u32,

    /// Whether this promotion may combine with others
    #[serde(default = "default_stackable")]
    pub stackable: bool,

    /// Discount kinds this promotion refuses to combine with
    #[serde(default)]
    pub conflicting_kinds: Vec<DiscountKind>,

    /// Minimum order amount in minor units, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<i64>,

    /// Cap on the computed discount in minor units, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_discount: Option<i64>,

    /// Product whitelist; empty means all products
    #[serde(default)]
    pub applicable_products: Vec<String>,

    /// Customer-tier whitelist; empty means all tiers
    #[serde(default)]
    pub customer_tiers: Vec<String>,

    /// Reserved for first-time customers
    #[serde(default)]
    pub first_time_only: bool,

    /// Free-form metadata
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

fn default_stackable() -> bool {
    true
}

impl PromotionCode {
    /// Create a stackable promotion with no eligibility constraints
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        discount_kind: DiscountKind,
        value: f64,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            discount_kind,
            value,
            priority: 0,
            stackable: true,
            conflicting_kinds: Vec::new(),
            min_amount: None,
            max_discount: None,
            applicable_products: Vec::new(),
            customer_tiers: Vec::new(),
            first_time_only: false,
            metadata: HashMap::new(),
        }
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Mark the promotion as non-stackable
    pub fn non_stackable(mut self) -> Self {
        self.stackable = false;
        self
    }

    /// Declare discount kinds this promotion conflicts with
    pub fn with_conflicting_kinds(mut self, kinds: Vec<DiscountKind>) -> Self {
        self.conflicting_kinds = kinds;
        self
    }

    /// Require a minimum order amount
    pub fn with_min_amount(mut self, min_amount: i64) -> Self {
        self.min_amount = Some(min_amount);
        self
    }

    /// Cap the computed discount
    pub fn with_max_discount(mut self, max_discount: i64) -> Self {
        self.max_discount = Some(max_discount);
        self
    }

    /// Restrict to specific products
    pub fn for_products(mut self, products: Vec<String>) -> Self {
        self.applicable_products = products;
        self
    }

    /// Restrict to specific customer tiers
    pub fn for_tiers(mut self, tiers: Vec<String>) -> Self {
        self.customer_tiers = tiers;
        self
    }

    /// Reserve for first-time customers
    pub fn first_time_only(mut self) -> Self {
        self.first_time_only = true;
        self
    }
}

/// Facts about the order a promotion stack is being validated for
#[derive(Debug, Clone)]
pub struct PromotionContext {
    pub customer_id: String,
    pub customer_tier: Option<String>,
    pub product_id: Option<String>,
    /// Original order amount before any discount
    pub amount: Money,
    /// Codes the customer asked for
    pub requested_codes: Vec<String>,
    pub first_time_customer: bool,
    /// Number of prior subscriptions this customer has held
    pub subscription_count: u32,
    pub metadata: HashMap<String, Value>,
}

impl PromotionContext {
    /// Create a context for an order amount and a set of requested codes
    pub fn new(customer_id: impl Into<String>, amount: Money, requested_codes: Vec<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            customer_tier: None,
            product_id: None,
            amount,
            requested_codes,
            first_time_customer: false,
            subscription_count: 0,
            metadata: HashMap::new(),
        }
    }

    /// Set the customer tier
    pub fn with_tier(mut self, tier: impl Into<String>) -> Self {
        self.customer_tier = Some(tier.into());
        self
    }

    /// Set the product being purchased
    pub fn with_product(mut self, product_id: impl Into<String>) -> Self {
        self.product_id = Some(product_id.into());
        self
    }

    /// Mark the customer as first-time
    pub fn first_time(mut self) -> Self {
        self.first_time_customer = true;
        self
    }

    /// Record prior subscription count
    pub fn with_subscription_count(mut self, count: u32) -> Self {
        self.subscription_count = count;
        self
    }
}

/// Why a set of promotions cannot stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictKind {
    /// More than one non-stackable promotion
    NonStackable,
    /// Multiple percentage promotions, at least one non-stackable
    PercentageConflict,
    /// A promotion's declared conflicting kinds name another's kind
    TypeConflict,
}

/// A set of mutually incompatible promotion codes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictGroup {
    pub kind: ConflictKind,
    pub codes: Vec<String>,
}

/// How conflict groups are reduced to one survivor each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StackingStrategy {
    KeepHighestPriority,
    KeepHighestValue,
    AllowStacking,
}

impl StackingStrategy {
    /// The wire-format name of this strategy
    pub fn as_str(&self) -> &'static str {
        match self {
            StackingStrategy::KeepHighestPriority => "KEEP_HIGHEST_PRIORITY",
            StackingStrategy::KeepHighestValue => "KEEP_HIGHEST_VALUE",
            StackingStrategy::AllowStacking => "ALLOW_STACKING",
        }
    }
}

/// One promotion that actually produced a discount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedPromotion {
    pub code: String,
    pub name: String,
    pub discount_amount: Money,
    pub reason: String,
}

/// One promotion dropped during validation or conflict resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedPromotion {
    pub code: String,
    pub reason: String,
}

/// Outcome of validating and pricing a promotion stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionStackingResult {
    /// At least one promotion survived validation, or at least one discount
    /// was actually applied (the sets can differ)
    pub is_valid: bool,

    /// Codes that survived eligibility and conflict resolution
    pub applicable_codes: Vec<String>,

    /// Codes that were part of any conflict group
    pub conflicting_codes: Vec<String>,

    /// Sum of applied discounts
    pub total_discount: Money,

    /// Order amount after discounts
    pub final_amount: Money,

    /// Discounts in application order
    pub applied_promotions: Vec<AppliedPromotion>,

    /// Dropped codes with human-readable reasons
    pub rejected_promotions: Vec<RejectedPromotion>,

    /// Human-readable warnings (e.g. degraded rule evaluation)
    pub warnings: Vec<String>,

    /// PROMOTION rules that matched during validation
    pub applied_rule_ids: Vec<String>,

    /// Counts, chosen strategy, evaluation timestamp
    pub metadata: HashMap<String, Value>,
}

/// Recommendation from the combination search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimalCombination {
    /// Winning code list; empty when nothing qualifies
    pub codes: Vec<String>,

    /// Savings the winning combination produces
    pub savings: Money,

    /// Why this combination won (or why none did)
    pub justification: String,

    /// When the search ran
    pub evaluated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promotion_code_builder() {
        let promo = PromotionCode::new("SUMMER10", "Summer Sale", DiscountKind::Percentage, 10.0)
            .with_priority(100)
            .non_stackable()
            .with_min_amount(500)
            .with_max_discount(200)
            .for_tiers(vec!["premium".to_string()])
            .first_time_only();

        assert_eq!(promo.code, "SUMMER10");
        assert!(!promo.stackable);
        assert_eq!(promo.min_amount, Some(500));
        assert_eq!(promo.max_discount, Some(200));
        assert!(promo.first_time_only);
    }

    #[test]
    fn test_promotion_code_defaults_stackable() {
        let promo = PromotionCode::new("X", "X", DiscountKind::FixedAmount, 50.0);
        assert!(promo.stackable);
        assert!(promo.conflicting_kinds.is_empty());
        assert!(promo.customer_tiers.is_empty());
    }

    #[test]
    fn test_promotion_context_builder() {
        let ctx = PromotionContext::new(
            "cust-1",
            Money::new(1000, "USD").unwrap(),
            vec!["A".to_string()],
        )
        .with_tier("premium")
        .with_product("plan-pro")
        .first_time();

        assert_eq!(ctx.customer_tier.as_deref(), Some("premium"));
        assert_eq!(ctx.product_id.as_deref(), Some("plan-pro"));
        assert!(ctx.first_time_customer);
    }

    #[test]
    fn test_promotion_code_serde() {
        let promo = PromotionCode::new("WELCOME", "Welcome", DiscountKind::FixedAmount, 500.0)
            .with_conflicting_kinds(vec![DiscountKind::Percentage]);

        let json = serde_json::to_string(&promo).unwrap();
        assert!(json.contains("FIXED_AMOUNT"));
        assert!(json.contains("PERCENTAGE"));

        let back: PromotionCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, promo);
    }
}
