use serde::{Deserialize, Serialize};

/// Immutable fee ledger entry, created once at release time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformFee {
    pub id: String,
    pub amount_cents: i64,
    pub applied_fee_bps: i64,
    /// None = the platform default percentage applied (no rule matched).
    pub applied_fee_rule_id: Option<String>,
    pub seller_id: String,
    pub payment_id: String,
    pub item_id: String,
    pub created_at: i64,
}

/// Seller's net credit record, created at release time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Earning {
    pub id: String,
    pub seller_id: String,
    /// Net of platform fee.
    pub amount_cents: i64,
    pub payment_id: String,
    pub item_id: String,
    pub status: EarningStatus,
    /// Set while the earning is reserved by or settled through a withdrawal.
    pub withdrawal_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EarningStatus {
    Available,
    WithdrawalPending,
    Withdrawn,
}

impl EarningStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "AVAILABLE",
            Self::WithdrawalPending => "WITHDRAWAL_PENDING",
            Self::Withdrawn => "WITHDRAWN",
        }
    }
}

impl std::str::FromStr for EarningStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(Self::Available),
            "WITHDRAWAL_PENDING" => Ok(Self::WithdrawalPending),
            "WITHDRAWN" => Ok(Self::Withdrawn),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for EarningStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
