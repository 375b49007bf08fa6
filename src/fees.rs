//! Tiered platform fee evaluation.
//!
//! Pure computation over an ordered rule set; no storage access, so the
//! release path can be unit-tested without a database. Amounts are integer
//! cents and percentages are basis points, so the arithmetic is exact.

use crate::models::FeeRule;
use serde::Serialize;

/// Result of evaluating the fee for one amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeeQuote {
    pub fee_cents: i64,
    pub net_cents: i64,
    pub applied_bps: i64,
    /// None = the platform default percentage applied.
    pub applied_rule_id: Option<String>,
}

/// Round-half-up of `amount * bps / 10000` in pure integer math.
fn fee_for(amount_cents: i64, bps: i64) -> i64 {
    (amount_cents * bps + 5_000) / 10_000
}

/// Select the applicable rule and compute fee and net payout.
///
/// `rules` must already be ordered by priority descending, ties broken by
/// ascending minimum amount (`queries::list_active_fee_rules` returns them
/// that way). The first rule whose bracket contains the amount wins;
/// with no match the platform default percentage applies.
pub fn evaluate(amount_cents: i64, rules: &[FeeRule], default_bps: i64) -> FeeQuote {
    let matched = rules.iter().find(|rule| {
        amount_cents >= rule.min_amount_cents
            && rule
                .max_amount_cents
                .map_or(true, |max| amount_cents <= max)
    });

    let (bps, rule_id) = match matched {
        Some(rule) => (rule.fee_bps, Some(rule.id.clone())),
        None => (default_bps, None),
    };

    let fee_cents = fee_for(amount_cents, bps);
    FeeQuote {
        fee_cents,
        net_cents: amount_cents - fee_cents,
        applied_bps: bps,
        applied_rule_id: rule_id,
    }
}
