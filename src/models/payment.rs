use serde::{Deserialize, Serialize};

/// One payment per purchase attempt. Created by the purchase-initiation
/// flow; mutated exclusively by the payment state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub item_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,

    /// Gateway identifier (e.g. "mockpay").
    pub gateway: String,
    /// Provider's transaction id, set when the first charge event arrives.
    pub gateway_transaction_id: Option<String>,

    /// Platform fee actually charged; set only at release, cleared on refund.
    pub platform_fee_charged_cents: Option<i64>,
    /// Non-null iff status is DISPUTED.
    pub active_dispute_id: Option<String>,
    pub failure_reason: Option<String>,

    pub created_at: i64,
    pub updated_at: i64,
}

/// Data required to create a payment (purchase initiation).
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePayment {
    pub item_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub gateway: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Initiated,
    SuccessfulEscrow,
    /// Escrowed and awaiting buyer confirmation. Behaves as a synonym of
    /// `SuccessfulEscrow` everywhere; nothing in this codebase produces it.
    PendingConfirmation,
    Disputed,
    ReleasedToSeller,
    RefundedToBuyer,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "INITIATED",
            Self::SuccessfulEscrow => "SUCCESSFUL_ESCROW",
            Self::PendingConfirmation => "PENDING_CONFIRMATION",
            Self::Disputed => "DISPUTED",
            Self::ReleasedToSeller => "RELEASED_TO_SELLER",
            Self::RefundedToBuyer => "REFUNDED_TO_BUYER",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// No further transition is legal from a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ReleasedToSeller | Self::RefundedToBuyer | Self::Failed | Self::Cancelled
        )
    }

    /// Funds are held and the buyer has not yet confirmed.
    pub fn in_escrow(&self) -> bool {
        matches!(self, Self::SuccessfulEscrow | Self::PendingConfirmation)
    }

    /// A dispute may be filed only while funds are held in escrow.
    pub fn is_disputable(&self) -> bool {
        self.in_escrow()
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INITIATED" => Ok(Self::Initiated),
            "SUCCESSFUL_ESCROW" => Ok(Self::SuccessfulEscrow),
            "PENDING_CONFIRMATION" => Ok(Self::PendingConfirmation),
            "DISPUTED" => Ok(Self::Disputed),
            "RELEASED_TO_SELLER" => Ok(Self::ReleasedToSeller),
            "REFUNDED_TO_BUYER" => Ok(Self::RefundedToBuyer),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a gateway charge attempt, normalized from webhook events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeOutcome {
    Success,
    Failure,
}
