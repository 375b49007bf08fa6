use serde::{Deserialize, Serialize};

/// Filed by buyer or seller against a payment held in escrow.
/// At most one open dispute per payment (enforced by a partial unique index).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispute {
    pub id: String,
    pub payment_id: String,
    pub item_id: String,
    pub filed_by_user_id: String,
    pub other_party_user_id: String,
    pub reason: String,
    pub description: Option<String>,
    pub status: DisputeStatus,
    pub resolution_notes: Option<String>,
    pub resolved_at: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDispute {
    pub payment_id: String,
    pub item_id: String,
    pub filed_by_user_id: String,
    pub other_party_user_id: String,
    pub reason: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisputeStatus {
    PendingAdmin,
    ResolvedRefund,
    ResolvedReleasePayment,
    Closed,
}

impl DisputeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingAdmin => "PENDING_ADMIN",
            Self::ResolvedRefund => "RESOLVED_REFUND",
            Self::ResolvedReleasePayment => "RESOLVED_RELEASE_PAYMENT",
            Self::Closed => "CLOSED",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::PendingAdmin)
    }
}

impl std::str::FromStr for DisputeStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING_ADMIN" => Ok(Self::PendingAdmin),
            "RESOLVED_REFUND" => Ok(Self::ResolvedRefund),
            "RESOLVED_RELEASE_PAYMENT" => Ok(Self::ResolvedReleasePayment),
            "CLOSED" => Ok(Self::Closed),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
