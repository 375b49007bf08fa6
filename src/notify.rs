//! Best-effort notification emission.
//!
//! The engine only produces structured "notify user X of event Y" requests;
//! delivery transport is someone else's problem. Requests are POSTed
//! fire-and-forget after the financial transaction commits, so a slow or
//! dead sink can never roll back ledger state.

use reqwest::Client;
use serde::Serialize;

/// A single notification request handed to the delivery service.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationRequest {
    pub user_id: String,
    /// e.g. "payment.escrowed", "payment.released", "dispute.filed"
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispute_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub withdrawal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_cents: Option<i64>,
    pub timestamp: i64,
}

impl NotificationRequest {
    pub fn new(user_id: &str, event: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            event: event.to_string(),
            payment_id: None,
            dispute_id: None,
            withdrawal_id: None,
            amount_cents: None,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn payment(mut self, payment_id: &str) -> Self {
        self.payment_id = Some(payment_id.to_string());
        self
    }

    pub fn dispute(mut self, dispute_id: &str) -> Self {
        self.dispute_id = Some(dispute_id.to_string());
        self
    }

    pub fn withdrawal(mut self, withdrawal_id: &str) -> Self {
        self.withdrawal_id = Some(withdrawal_id.to_string());
        self
    }

    pub fn amount(mut self, amount_cents: i64) -> Self {
        self.amount_cents = Some(amount_cents);
        self
    }
}

/// Notification sink. With no URL configured the requests are only logged,
/// which is what dev mode and tests want.
pub struct Notifier {
    client: Client,
    webhook_url: Option<String>,
}

impl Notifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            webhook_url,
        }
    }

    /// Spawn a background task to deliver the request. Failures are logged
    /// and dropped; the caller has already committed.
    pub fn send(&self, request: NotificationRequest) {
        let Some(url) = self.webhook_url.clone() else {
            tracing::debug!(
                "Notification (no sink configured): user={} event={}",
                request.user_id,
                request.event
            );
            return;
        };

        let client = self.client.clone();
        tokio::spawn(async move {
            match client.post(&url).json(&request).send().await {
                Ok(response) if !response.status().is_success() => {
                    tracing::warn!(
                        "Notification sink returned {} for event {}",
                        response.status(),
                        request.event
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("Failed to deliver notification {}: {}", request.event, e);
                }
            }
        });
    }
}
