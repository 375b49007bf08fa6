use serde::{Deserialize, Serialize};

/// Tiered fee rule: maps an amount bracket to a fee in basis points.
/// Selected by priority descending, ties broken by ascending min amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeRule {
    pub id: String,
    pub min_amount_cents: i64,
    /// None = unbounded above.
    pub max_amount_cents: Option<i64>,
    /// Fee percentage in basis points (800 = 8%). Range 0..=10000.
    pub fee_bps: i64,
    pub is_active: bool,
    pub priority: i64,
    pub created_at: i64,
}

/// Singleton platform record. `total_platform_fees_cents` is only ever
/// changed through an atomic in-database increment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSettings {
    pub id: String,
    pub default_fee_bps: i64,
    pub total_platform_fees_cents: i64,
    pub updated_at: i64,
}

impl PlatformSettings {
    /// Fixed primary key of the singleton row.
    pub const ROW_ID: &'static str = "platform";
}
