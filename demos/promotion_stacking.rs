//! Promotion stacking example
//!
//! This example demonstrates:
//! - Building a resolver with a promotion code table
//! - Validating a requested promotion stack
//! - Searching for the optimal code combination

use rebill_core::rule::DiscountKind;
use rebill_core::Money;
use rebill_engine::RuleRegistry;
use rebill_policies::{PromotionCode, PromotionContext, PromotionStackingResolver};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Promotion Stacking Example ===\n");

    let registry = RuleRegistry::new().into_shared();
    let resolver = PromotionStackingResolver::new(registry).with_codes(vec![
        PromotionCode::new("WELCOME10", "Welcome Discount", DiscountKind::Percentage, 10.0)
            .with_priority(120)
            .first_time_only(),
        PromotionCode::new("SAVE500", "Flat 5.00 Off", DiscountKind::FixedAmount, 500.0)
            .with_priority(100)
            .with_min_amount(2000),
        PromotionCode::new("LOYAL5", "Loyalty Bonus", DiscountKind::Percentage, 5.0)
            .with_priority(80),
        PromotionCode::new("MEGA20", "Mega Sale", DiscountKind::Percentage, 20.0)
            .with_priority(60)
            .non_stackable(),
    ]);
    resolver.register_default_rules()?;

    // A first-time customer orders a 49.99 plan with three codes
    let ctx = PromotionContext::new(
        "cust-42",
        Money::new(4999, "USD")?,
        vec![
            "WELCOME10".to_string(),
            "SAVE500".to_string(),
            "MEGA20".to_string(),
        ],
    )
    .with_tier("standard")
    .with_product("plan-pro")
    .first_time();

    let result = resolver.validate_stacking(&ctx);

    println!("Stacking Results:");
    println!("  Valid: {}", result.is_valid);
    println!("  Applicable: {:?}", result.applicable_codes);
    println!("  Conflicting: {:?}", result.conflicting_codes);
    println!("  Total Discount: {}", result.total_discount);
    println!("  Final Amount: {}", result.final_amount);
    for applied in &result.applied_promotions {
        println!("    {} -> {} ({})", applied.code, applied.discount_amount, applied.reason);
    }
    for rejected in &result.rejected_promotions {
        println!("  Rejected {}: {}", rejected.code, rejected.reason);
    }

    // Which combination of all known codes would serve this order best?
    let available = vec![
        "WELCOME10".to_string(),
        "SAVE500".to_string(),
        "LOYAL5".to_string(),
        "MEGA20".to_string(),
    ];
    let optimal = resolver.find_optimal_combination(&ctx, &available)?;

    println!("\nOptimal Combination:");
    println!("  Codes: {:?}", optimal.codes);
    println!("  Savings: {}", optimal.savings);
    println!("  Justification: {}", optimal.justification);

    // The full result is what an API layer would return
    println!("\nResult as JSON:\n{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
