//! Dunning flow example
//!
//! This example demonstrates:
//! - Sharing one rule registry across the retry and billing policies
//! - Deciding whether a failed payment should retry
//! - Gating the next scheduled charge

use rebill_core::Money;
use rebill_engine::RuleRegistry;
use rebill_policies::{
    billing, BillingContext, BillingDecisionPolicy, FailureCategory, RetryContext,
    RetryDecisionPolicy,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Dunning Flow Example ===\n");

    let registry = RuleRegistry::new().into_shared();
    let retry_policy = RetryDecisionPolicy::new(registry.clone());
    let billing_policy = BillingDecisionPolicy::new(registry.clone());
    retry_policy.register_default_rules()?;
    billing_policy.register_default_rules()?;

    {
        let stats = registry.read().unwrap().statistics();
        println!("Registry: {} rules loaded ({} enabled)\n", stats.total, stats.enabled);
    }

    // A 25.00 charge failed for the second time with a soft decline
    let retry_ctx = RetryContext::new(
        "pay-1138",
        "sub-77",
        "cust-42",
        2,
        FailureCategory::Retriable,
        Money::new(2500, "USD")?,
    )
    .with_failure_code("insufficient_funds")
    .with_failure_message("card has insufficient funds");

    let retry = retry_policy.evaluate(&retry_ctx);
    println!("Retry Decision:");
    println!("  Should Retry: {}", retry.should_retry);
    println!("  Next Retry At: {:?}", retry.next_retry_at);
    println!("  Escalate: {}", retry.escalate_to_manual);
    println!("  Notify Customer: {}", retry.notify_customer);
    println!("  Reason: {}", retry.reason);

    // Meanwhile the subscription is past due with a small renewal coming up
    let billing_ctx = BillingContext::new(
        "sub-77",
        "cust-42",
        Money::new(999, "USD")?,
        chrono::Utc::now(),
    )
    .past_due()
    .with_failed_attempts(2);

    let decision = billing_policy.evaluate(&billing_ctx);
    println!("\nBilling Decision:");
    println!("  Should Attempt: {}", decision.should_attempt_billing);
    println!("  Recommended Amount: {}", decision.recommended_amount);
    println!("  Delay Days: {}", decision.delay_days);
    println!("  Reason: {}", decision.reason);

    // A mid-cycle downgrade produces a prorated credit
    let credit = billing::prorate_plan_change(
        &Money::new(4999, "USD")?,
        &Money::new(2999, "USD")?,
        12,
        30,
    )?;
    println!("\nProrated downgrade credit: {}", credit);

    Ok(())
}
