use serde::{Deserialize, Serialize};

/// Marketplace listing. Quantity and status change only through ledger
/// accounting as a side effect of payment transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub seller_id: String,
    pub title: String,
    pub price_cents: i64,
    pub quantity: i64,
    pub status: ItemStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateItem {
    pub seller_id: String,
    pub title: String,
    pub price_cents: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Available,
    PaidEscrow,
    Sold,
    Disputed,
    Delisted,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "AVAILABLE",
            Self::PaidEscrow => "PAID_ESCROW",
            Self::Sold => "SOLD",
            Self::Disputed => "DISPUTED",
            Self::Delisted => "DELISTED",
        }
    }
}

impl std::str::FromStr for ItemStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(Self::Available),
            "PAID_ESCROW" => Ok(Self::PaidEscrow),
            "SOLD" => Ok(Self::Sold),
            "DISPUTED" => Ok(Self::Disputed),
            "DELISTED" => Ok(Self::Delisted),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
