//! Optimal promotion combination search
//!
//! Enumerates every non-empty subset of the available codes and re-runs
//! stack validation per subset, so the cost is O(2^n) validations. The
//! input size is guarded; anything beyond a handful of codes belongs to a
//! pruned search, not this exhaustive one.

use super::resolver::PromotionStackingResolver;
use super::types::{OptimalCombination, PromotionContext};
use crate::error::{PolicyError, Result};
use rebill_core::Money;
use chrono::Utc;

/// Upper bound on the exhaustive subset enumeration
pub const MAX_COMBINATION_CODES: usize = 12;

/// Below this order amount, a multi-code combination must double the savings
/// of the incumbent to win; above it, a 10% improvement suffices
const SMALL_ORDER_THRESHOLD: i64 = 500;

impl PromotionStackingResolver {
    /// Search all combinations of `available_codes` for the one yielding the
    /// best savings.
    ///
    /// The best single code is the baseline; a multi-code subset replaces
    /// the incumbent only when its savings exceed the incumbent's by the
    /// profitability threshold. This deliberately rejects combinations that
    /// look marginally better only due to stacking artifacts.
    pub fn find_optimal_combination(
        &self,
        ctx: &PromotionContext,
        available_codes: &[String],
    ) -> Result<OptimalCombination> {
        let currency = ctx.amount.currency.clone();

        if available_codes.is_empty() {
            return Ok(OptimalCombination {
                codes: Vec::new(),
                savings: Money::zero(currency),
                justification: "no valid combination found".to_string(),
                evaluated_at: Utc::now(),
            });
        }
        if available_codes.len() > MAX_COMBINATION_CODES {
            return Err(PolicyError::TooManyCodes {
                count: available_codes.len(),
                max: MAX_COMBINATION_CODES,
            });
        }

        let threshold = if ctx.amount.amount < SMALL_ORDER_THRESHOLD {
            1.0
        } else {
            0.1
        };

        let mut best_codes: Vec<String> = Vec::new();
        let mut best_savings: i64 = 0;
        let mut best_is_single = true;

        // Baseline: best single code by resulting total discount
        for code in available_codes {
            let result = self.validate_stacking(&subset_context(ctx, vec![code.clone()]));
            if result.is_valid && result.total_discount.amount > best_savings {
                best_savings = result.total_discount.amount;
                best_codes = vec![code.clone()];
            }
        }

        // Multi-code subsets must beat the incumbent by the threshold
        let n = available_codes.len();
        for mask in 1u32..(1u32 << n) {
            if mask.count_ones() < 2 {
                continue;
            }

            let subset: Vec<String> = (0..n)
                .filter(|i| mask & (1 << i) != 0)
                .map(|i| available_codes[i].clone())
                .collect();

            let result = self.validate_stacking(&subset_context(ctx, subset.clone()));
            if !result.is_valid {
                continue;
            }

            let savings = result.total_discount.amount;
            let required = best_savings + (best_savings as f64 * threshold) as i64;
            if savings > required {
                tracing::debug!(
                    ?subset,
                    savings,
                    previous_best = best_savings,
                    "combination beats incumbent"
                );
                best_savings = savings;
                best_codes = subset;
                best_is_single = false;
            }
        }

        let justification = if best_codes.is_empty() {
            "no valid combination found".to_string()
        } else if best_is_single {
            format!(
                "single code '{}' yields the best savings ({})",
                best_codes[0], best_savings
            )
        } else {
            format!(
                "stacking {} codes beats the best single code by more than {:.0}%",
                best_codes.len(),
                threshold * 100.0
            )
        };

        Ok(OptimalCombination {
            codes: best_codes,
            savings: Money::signed(best_savings, currency),
            justification,
            evaluated_at: Utc::now(),
        })
    }
}

/// The same order facts with a different requested-code set
fn subset_context(ctx: &PromotionContext, requested_codes: Vec<String>) -> PromotionContext {
    let mut subset = ctx.clone();
    subset.requested_codes = requested_codes;
    subset
}
