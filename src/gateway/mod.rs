//! Gateway adapter boundary.
//!
//! Provider payloads vary by event type, so each adapter normalizes its
//! wire format into one canonical [`GatewayEvent`] before anything reaches
//! the payment engine. The engine never sees provider field names.

mod client;
mod signature;

pub use client::{GatewayClient, TransferOutcome};
pub use signature::{sign, verify_signature};

use serde::Deserialize;

use crate::error::{AppError, Result};

/// Canonical classification of an inbound gateway event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEventKind {
    ChargeSucceeded,
    ChargeFailed,
    TransferSucceeded,
    TransferFailed,
    TransferReversed,
    /// Gateway liveness probe; answered synchronously, no domain reads.
    ChallengeRequest,
    /// Event name we do not handle; acknowledged and dropped.
    Ignored,
}

/// Provider event normalized for the engine.
#[derive(Debug, Clone)]
pub struct GatewayEvent {
    pub kind: GatewayEventKind,
    /// Provider's unique event/transaction id, used for replay dedup.
    pub transaction_id: String,
    /// Echo of our internal id: payment id for charge events, transfer id
    /// for payout events.
    pub reference: String,
    pub amount_cents: Option<i64>,
    pub failure_reason: Option<String>,
    /// Only set for challenge requests.
    pub challenge: Option<String>,
}

/// Raw webhook payload as delivered by the gateway.
#[derive(Debug, Deserialize)]
pub struct GatewayWebhookPayload {
    pub event: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub amount_cents: Option<i64>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub challenge: Option<String>,
}

/// Parse and classify a raw webhook body.
pub fn classify_event(body: &[u8]) -> Result<GatewayEvent> {
    let payload: GatewayWebhookPayload = serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Unparseable webhook body: {}", e)))?;

    let kind = match payload.event.as_str() {
        "charge.succeeded" => GatewayEventKind::ChargeSucceeded,
        "charge.failed" => GatewayEventKind::ChargeFailed,
        "transfer.succeeded" => GatewayEventKind::TransferSucceeded,
        "transfer.failed" => GatewayEventKind::TransferFailed,
        "transfer.reversed" => GatewayEventKind::TransferReversed,
        "challenge" => GatewayEventKind::ChallengeRequest,
        _ => GatewayEventKind::Ignored,
    };

    // Challenges and ignored events carry no reference; everything else must.
    let needs_reference = !matches!(
        kind,
        GatewayEventKind::ChallengeRequest | GatewayEventKind::Ignored
    );
    let reference = payload.reference.unwrap_or_default();
    if needs_reference && reference.is_empty() {
        return Err(AppError::BadRequest(
            "Webhook event missing reference".into(),
        ));
    }

    Ok(GatewayEvent {
        kind,
        transaction_id: payload.transaction_id.unwrap_or_default(),
        reference,
        amount_cents: payload.amount_cents,
        failure_reason: payload.failure_reason,
        challenge: payload.challenge,
    })
}
