use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::error::{AppError, Result};

/// Upper bound on any single outbound gateway call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Bounded retries for transfer initiation before the withdrawal is failed.
const TRANSFER_ATTEMPTS: u32 = 3;

#[derive(Debug, Deserialize)]
struct InitiateTransferResponse {
    transfer_id: String,
}

/// Result of asking the gateway to start a payout transfer.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub transfer_id: String,
}

/// Outbound client for the payment gateway API. The engine only depends on
/// this contract; no provider SDK leaks past it.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
    secret: String,
}

impl GatewayClient {
    pub fn new(base_url: &str, secret: &str) -> Self {
        // Startup-only construction; every outbound call must carry the
        // timeout, so a builder failure is fatal.
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build gateway HTTP client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret: secret.to_string(),
        }
    }

    /// Initiate a payout transfer for a withdrawal. Retries transient
    /// failures a bounded number of times; any terminal failure surfaces as
    /// a domain `Gateway` error, never a raw timeout.
    pub async fn initiate_transfer(
        &self,
        withdrawal_id: &str,
        recipient_user_id: &str,
        amount_cents: i64,
        currency: &str,
    ) -> Result<TransferOutcome> {
        let url = format!("{}/v1/transfers", self.base_url);
        let mut last_error = String::new();

        for attempt in 1..=TRANSFER_ATTEMPTS {
            let result = self
                .client
                .post(&url)
                .bearer_auth(&self.secret)
                .form(&[
                    ("reference", withdrawal_id),
                    ("recipient", recipient_user_id),
                    ("amount_cents", &amount_cents.to_string()),
                    ("currency", currency),
                ])
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    let parsed: InitiateTransferResponse = response.json().await.map_err(|e| {
                        AppError::Gateway(format!("Unparseable transfer response: {}", e))
                    })?;
                    return Ok(TransferOutcome {
                        transfer_id: parsed.transfer_id,
                    });
                }
                Ok(response) if response.status().is_server_error() => {
                    last_error = format!("gateway returned {}", response.status());
                    tracing::warn!(
                        "Transfer initiation attempt {}/{} failed: {}",
                        attempt,
                        TRANSFER_ATTEMPTS,
                        last_error
                    );
                }
                Ok(response) => {
                    // 4xx: retrying will not help.
                    let body = response.text().await.unwrap_or_default();
                    return Err(AppError::Gateway(format!(
                        "Transfer rejected by gateway: {}",
                        body
                    )));
                }
                Err(e) => {
                    last_error = e.to_string();
                    tracing::warn!(
                        "Transfer initiation attempt {}/{} failed: {}",
                        attempt,
                        TRANSFER_ATTEMPTS,
                        last_error
                    );
                }
            }
        }

        Err(AppError::Gateway(format!(
            "Transfer initiation failed after {} attempts: {}",
            TRANSFER_ATTEMPTS, last_error
        )))
    }
}
