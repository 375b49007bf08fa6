use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Shared message constants so handlers and engine agree on wording.
pub mod msg {
    pub const PAYMENT_NOT_FOUND: &str = "Payment not found";
    pub const ITEM_NOT_FOUND: &str = "Item not found";
    pub const DISPUTE_NOT_FOUND: &str = "Dispute not found";
    pub const WITHDRAWAL_NOT_FOUND: &str = "Withdrawal not found";
    pub const USER_NOT_FOUND: &str = "User not found";
    pub const PAYMENT_ALREADY_TERMINAL: &str = "Payment is in a terminal state";
    pub const PAYMENT_NOT_IN_ESCROW: &str = "Payment is not in escrow";
    pub const PAYMENT_NOT_DISPUTABLE: &str = "Payment is not in a disputable state";
    pub const DISPUTE_ALREADY_OPEN: &str = "An open dispute already exists for this payment";
    pub const DISPUTE_ALREADY_RESOLVED: &str = "Dispute is already resolved";
    pub const NOT_PARTY_TO_PAYMENT: &str = "Not a party to this payment";
    pub const ADMIN_REQUIRED: &str = "Administrator access required";
    pub const INSUFFICIENT_BALANCE: &str = "Insufficient available balance";
    pub const WITHDRAWAL_ALREADY_TERMINAL: &str = "Withdrawal is in a terminal state";
}

/// Extension to turn `Option<T>` lookups into `NotFound` errors.
pub trait OptionExt<T> {
    fn or_not_found(self, what: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, what: &str) -> Result<T> {
        self.ok_or_else(|| AppError::NotFound(what.to_string()))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", Some(msg.clone())),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad request", Some(msg.clone())),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized", None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "Forbidden", Some(msg.clone())),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", Some(msg.clone())),
            AppError::InvalidSignature => {
                // Security event: a caller presented a webhook with a bad signature.
                tracing::warn!("Webhook rejected: invalid signature");
                (StatusCode::UNAUTHORIZED, "Invalid signature", None)
            }
            AppError::Gateway(msg) => {
                tracing::error!("Gateway error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Payment gateway error", None)
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (StatusCode::BAD_REQUEST, "Invalid JSON", Some(e.to_string()))
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
