//! Promotion stacking resolver

use super::types::{
    AppliedPromotion, ConflictGroup, ConflictKind, PromotionCode, PromotionContext,
    PromotionStackingResult, RejectedPromotion, StackingStrategy,
};
use crate::error::Result;
use rebill_core::rule::{Condition, ConditionOperator, DiscountKind};
use rebill_core::{Money, Rule, RuleAction, RuleType, Value};
use rebill_engine::registry::{self, SharedRegistry};
use rebill_engine::{ExecutionContext, RulesEngine};
use chrono::Utc;
use std::collections::HashMap;

/// Validates, deconflicts, combines and prices promotion code stacks.
///
/// Holds the promotion-code descriptor table and consults the shared rule
/// registry for supplementary PROMOTION-type rules.
pub struct PromotionStackingResolver {
    codes: HashMap<String, PromotionCode>,
    engine: RulesEngine,
    registry: SharedRegistry,
}

impl PromotionStackingResolver {
    /// Create a resolver over a shared registry with an empty code table
    pub fn new(registry: SharedRegistry) -> Self {
        Self {
            codes: HashMap::new(),
            engine: RulesEngine::new(registry.clone()),
            registry,
        }
    }

    /// Add one promotion code descriptor
    pub fn with_code(mut self, code: PromotionCode) -> Self {
        self.codes.insert(code.code.clone(), code);
        self
    }

    /// Add many promotion code descriptors
    pub fn with_codes(mut self, codes: Vec<PromotionCode>) -> Self {
        for code in codes {
            self.codes.insert(code.code.clone(), code);
        }
        self
    }

    /// Look up a descriptor by code
    pub fn get_code(&self, code: &str) -> Option<&PromotionCode> {
        self.codes.get(code)
    }

    /// Register the built-in PROMOTION rules.
    ///
    /// These record side information about the order (first-time customer,
    /// high-value order) when they match; they never alter the candidate
    /// promotion list.
    pub fn register_default_rules(&self) -> Result<()> {
        let mut registry = registry::write_locked(&self.registry);

        registry.register_rule(
            Rule::new(
                "promo-first-time-customer",
                "First Time Customer",
                RuleType::Promotion,
                vec![RuleAction::SetValue {
                    field: "promotion.segment".to_string(),
                    value: Value::from("new_customer"),
                }],
            )
            .with_priority(100)
            .add_condition(Condition::new(
                "customer.first_time",
                ConditionOperator::Equals,
                Value::Bool(true),
            )),
        )?;

        registry.register_rule(
            Rule::new(
                "promo-high-value-order",
                "High Value Order",
                RuleType::Promotion,
                vec![RuleAction::SetValue {
                    field: "order.high_value".to_string(),
                    value: Value::Bool(true),
                }],
            )
            .with_priority(50)
            .add_condition(Condition::new(
                "order.amount",
                ConditionOperator::GreaterOrEqual,
                Value::Number(5000.0),
            )),
        )?;

        Ok(())
    }

    /// Validate a requested promotion stack and price the survivors.
    ///
    /// Unknown codes are silently dropped. Eligible codes are deconflicted,
    /// then discounts apply in descending-priority order; a discount never
    /// drives the remaining balance below zero.
    pub fn validate_stacking(&self, ctx: &PromotionContext) -> PromotionStackingResult {
        let mut rejected: Vec<RejectedPromotion> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();

        // 1. Resolve requested codes; unknown codes are dropped, not rejected
        let resolved: Vec<&PromotionCode> = ctx
            .requested_codes
            .iter()
            .filter_map(|code| {
                let found = self.codes.get(code);
                if found.is_none() {
                    tracing::debug!(%code, "unknown promotion code, dropping");
                }
                found
            })
            .collect();

        // 2. Eligibility checks
        let mut eligible: Vec<&PromotionCode> = Vec::new();
        for promo in resolved {
            match check_eligibility(promo, ctx) {
                None => eligible.push(promo),
                Some(reason) => {
                    tracing::debug!(code = %promo.code, %reason, "promotion rejected");
                    rejected.push(RejectedPromotion {
                        code: promo.code.clone(),
                        reason,
                    });
                }
            }
        }

        // 3. Conflict detection and strategy selection
        let conflict_groups = detect_conflicts(&eligible);
        let strategy = choose_strategy(&conflict_groups, &eligible);
        let conflicting_codes = collect_conflicting_codes(&conflict_groups);

        // 4. Supplementary PROMOTION rules, recorded as side information only
        let rule_result = self
            .engine
            .execute(RuleType::Promotion, &derive_rule_context(ctx, &eligible));
        let applied_rule_ids = rule_result.applied_rules;
        if !rule_result.success {
            warnings.push("promotion rule evaluation reported errors".to_string());
        }

        // 5. Conflict resolution: one survivor per group
        let eligible_count = eligible.len();
        let survivors = resolve_conflicts(eligible, &conflict_groups, strategy, ctx, &mut rejected);

        // 6. Discount application in descending-priority order
        let mut ordered = survivors.clone();
        ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

        let currency = ctx.amount.currency.clone();
        let mut remaining = ctx.amount.clone();
        let mut total_discount = Money::zero(currency.clone());
        let mut applied: Vec<AppliedPromotion> = Vec::new();

        for promo in &ordered {
            if remaining.is_zero() {
                break;
            }

            let mut discount = estimate_discount(promo, &ctx.amount);
            if let Some(cap) = promo.max_discount {
                if discount.amount > cap {
                    discount = Money::signed(cap.max(0), currency.clone());
                }
            }
            // Never drive the balance negative
            if discount.amount > remaining.amount {
                discount = remaining.clone();
            }

            if discount.is_zero() {
                tracing::debug!(code = %promo.code, "zero-value discount, not recording");
                continue;
            }

            remaining = Money::signed(remaining.amount - discount.amount, currency.clone());
            total_discount = Money::signed(total_discount.amount + discount.amount, currency.clone());
            applied.push(AppliedPromotion {
                code: promo.code.clone(),
                name: promo.name.clone(),
                discount_amount: discount,
                reason: describe_discount(promo),
            });
        }

        // 7. Valid if anything survived validation OR any discount applied
        let is_valid = !survivors.is_empty() || !applied.is_empty();

        let mut metadata = HashMap::new();
        metadata.insert(
            "requested_count".to_string(),
            Value::from(ctx.requested_codes.len() as i64),
        );
        metadata.insert(
            "eligible_count".to_string(),
            Value::from(eligible_count as i64),
        );
        metadata.insert(
            "conflict_group_count".to_string(),
            Value::from(conflict_groups.len() as i64),
        );
        metadata.insert("strategy".to_string(), Value::from(strategy.as_str()));
        metadata.insert(
            "evaluated_at".to_string(),
            Value::from(Utc::now().to_rfc3339()),
        );

        PromotionStackingResult {
            is_valid,
            applicable_codes: survivors.iter().map(|p| p.code.clone()).collect(),
            conflicting_codes,
            total_discount,
            final_amount: remaining,
            applied_promotions: applied,
            rejected_promotions: rejected,
            warnings,
            applied_rule_ids,
            metadata,
        }
    }
}

/// First failed eligibility check, as a human-readable reason
fn check_eligibility(promo: &PromotionCode, ctx: &PromotionContext) -> Option<String> {
    if let Some(min) = promo.min_amount {
        if ctx.amount.amount < min {
            return Some(format!(
                "order amount {} is below the minimum {} required by '{}'",
                ctx.amount.amount, min, promo.code
            ));
        }
    }

    if !promo.customer_tiers.is_empty() {
        let tier = ctx.customer_tier.as_deref().unwrap_or("");
        if !promo.customer_tiers.iter().any(|t| t == tier) {
            return Some(format!(
                "customer tier '{}' is not eligible for '{}'",
                tier, promo.code
            ));
        }
    }

    if !promo.applicable_products.is_empty() {
        let product = ctx.product_id.as_deref().unwrap_or("");
        if !promo.applicable_products.iter().any(|p| p == product) {
            return Some(format!(
                "'{}' does not apply to product '{}'",
                promo.code, product
            ));
        }
    }

    if promo.first_time_only && !ctx.first_time_customer {
        return Some(format!("'{}' is reserved for first-time customers", promo.code));
    }

    None
}

/// Conflict detection over the eligible subset
fn detect_conflicts(eligible: &[&PromotionCode]) -> Vec<ConflictGroup> {
    let mut groups = Vec::new();

    // (i) more than one non-stackable promotion
    let non_stackable: Vec<&&PromotionCode> =
        eligible.iter().filter(|p| !p.stackable).collect();
    if non_stackable.len() > 1 {
        groups.push(ConflictGroup {
            kind: ConflictKind::NonStackable,
            codes: non_stackable.iter().map(|p| p.code.clone()).collect(),
        });
    }

    // (ii) multiple percentage promotions where at least one is non-stackable
    let percentage: Vec<&&PromotionCode> = eligible
        .iter()
        .filter(|p| p.discount_kind == DiscountKind::Percentage)
        .collect();
    if percentage.len() > 1 && percentage.iter().any(|p| !p.stackable) {
        groups.push(ConflictGroup {
            kind: ConflictKind::PercentageConflict,
            codes: percentage.iter().map(|p| p.code.clone()).collect(),
        });
    }

    // (iii) declared kind conflicts, pairwise
    for (i, a) in eligible.iter().enumerate() {
        for b in eligible.iter().skip(i + 1) {
            let a_hits_b = a.conflicting_kinds.contains(&b.discount_kind);
            let b_hits_a = b.conflicting_kinds.contains(&a.discount_kind);
            if a_hits_b || b_hits_a {
                groups.push(ConflictGroup {
                    kind: ConflictKind::TypeConflict,
                    codes: vec![a.code.clone(), b.code.clone()],
                });
            }
        }
    }

    groups
}

/// Pick the global resolution strategy
fn choose_strategy(groups: &[ConflictGroup], eligible: &[&PromotionCode]) -> StackingStrategy {
    if groups.is_empty() {
        return StackingStrategy::AllowStacking;
    }

    let conflicting: Vec<&str> = groups
        .iter()
        .flat_map(|g| g.codes.iter().map(String::as_str))
        .collect();
    let any_non_stackable = eligible
        .iter()
        .any(|p| conflicting.contains(&p.code.as_str()) && !p.stackable);

    if any_non_stackable {
        StackingStrategy::KeepHighestPriority
    } else {
        StackingStrategy::KeepHighestValue
    }
}

fn collect_conflicting_codes(groups: &[ConflictGroup]) -> Vec<String> {
    let mut codes: Vec<String> = Vec::new();
    for group in groups {
        for code in &group.codes {
            if !codes.contains(code) {
                codes.push(code.clone());
            }
        }
    }
    codes
}

/// Keep exactly one promotion per conflict group, discarding the rest
fn resolve_conflicts<'a>(
    eligible: Vec<&'a PromotionCode>,
    groups: &[ConflictGroup],
    strategy: StackingStrategy,
    ctx: &PromotionContext,
    rejected: &mut Vec<RejectedPromotion>,
) -> Vec<&'a PromotionCode> {
    let mut survivors = eligible;

    for group in groups {
        let members: Vec<&PromotionCode> = survivors
            .iter()
            .filter(|p| group.codes.contains(&p.code))
            .copied()
            .collect();
        if members.len() <= 1 {
            continue;
        }

        // Ties keep the first candidate
        let keeper = match strategy {
            StackingStrategy::KeepHighestPriority => {
                pick_best(&members, |p| p.priority as i64)
            }
            StackingStrategy::KeepHighestValue => {
                pick_best(&members, |p| estimate_discount(p, &ctx.amount).amount)
            }
            StackingStrategy::AllowStacking => members.first().copied(),
        };
        let Some(keeper) = keeper else { continue };

        tracing::debug!(
            group_kind = ?group.kind,
            keeper = %keeper.code,
            "resolving conflict group"
        );

        survivors.retain(|p| {
            if p.code == keeper.code || !group.codes.contains(&p.code) {
                return true;
            }
            rejected.push(RejectedPromotion {
                code: p.code.clone(),
                reason: format!("conflict with '{}' ({:?})", keeper.code, group.kind),
            });
            false
        });
    }

    survivors
}

/// The member with the strictly highest key; earlier members win ties
fn pick_best<'a>(
    members: &[&'a PromotionCode],
    key: impl Fn(&PromotionCode) -> i64,
) -> Option<&'a PromotionCode> {
    let mut best: Option<&'a PromotionCode> = None;
    for promo in members.iter().copied() {
        match best {
            Some(current) if key(promo) <= key(current) => {}
            _ => best = Some(promo),
        }
    }
    best
}

/// Raw discount a promotion yields on the original amount, before clamping
fn estimate_discount(promo: &PromotionCode, amount: &Money) -> Money {
    match promo.discount_kind {
        DiscountKind::Percentage => amount.percentage(promo.value),
        DiscountKind::FixedAmount => {
            Money::signed((promo.value.round() as i64).max(0), amount.currency.clone())
        }
        DiscountKind::FreePeriod => Money::zero(amount.currency.clone()),
    }
}

fn describe_discount(promo: &PromotionCode) -> String {
    match promo.discount_kind {
        DiscountKind::Percentage => format!("{}% off", promo.value),
        DiscountKind::FixedAmount => format!("{} off", promo.value.round() as i64),
        DiscountKind::FreePeriod => format!("{} free days", promo.value.round() as i64),
    }
}

/// Derived fact context the supplementary PROMOTION rules see
fn derive_rule_context(ctx: &PromotionContext, eligible: &[&PromotionCode]) -> ExecutionContext {
    let mut customer = HashMap::new();
    customer.insert("id".to_string(), Value::from(ctx.customer_id.as_str()));
    if let Some(tier) = &ctx.customer_tier {
        customer.insert("tier".to_string(), Value::from(tier.as_str()));
    }
    customer.insert(
        "first_time".to_string(),
        Value::Bool(ctx.first_time_customer),
    );
    customer.insert(
        "subscription_count".to_string(),
        Value::from(ctx.subscription_count),
    );

    let mut order = HashMap::new();
    order.insert("amount".to_string(), Value::Number(ctx.amount.amount as f64));
    order.insert(
        "currency".to_string(),
        Value::from(ctx.amount.currency.as_str()),
    );
    if let Some(product) = &ctx.product_id {
        order.insert("product_id".to_string(), Value::from(product.as_str()));
    }

    let mut promotion = HashMap::new();
    promotion.insert(
        "requested_codes".to_string(),
        Value::Array(
            ctx.requested_codes
                .iter()
                .map(|c| Value::from(c.as_str()))
                .collect(),
        ),
    );
    promotion.insert(
        "eligible_codes".to_string(),
        Value::Array(
            eligible
                .iter()
                .map(|p| Value::from(p.code.as_str()))
                .collect(),
        ),
    );
    promotion.insert(
        "eligible_count".to_string(),
        Value::from(eligible.len() as i64),
    );

    let mut data = HashMap::new();
    data.insert("customer".to_string(), Value::Object(customer));
    data.insert("order".to_string(), Value::Object(order));
    data.insert("promotion".to_string(), Value::Object(promotion));

    ExecutionContext::new(data)
}
