//! Inbound gateway webhooks.
//!
//! The signature covers the raw body, so the handler takes `Bytes` and only
//! parses JSON after verification. Handled events are acknowledged with
//! `{"received": true}` whether they applied or replayed; the gateway only
//! needs to know we have the event.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};

use crate::db::AppState;
use crate::engine::payment::ChargeResult;
use crate::engine::withdrawal::TransferResult;
use crate::engine::{payment, withdrawal};
use crate::error::{AppError, Result};
use crate::gateway::{classify_event, verify_signature, GatewayEvent, GatewayEventKind};
use crate::models::ChargeOutcome;
use crate::notify::NotificationRequest;

pub fn router() -> Router<AppState> {
    Router::new().route("/webhook/gateway", post(receive_gateway_webhook))
}

async fn receive_gateway_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let signature = headers
        .get("x-gateway-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::InvalidSignature)?;
    if !verify_signature(&state.webhook_secret, &body, signature) {
        return Err(AppError::InvalidSignature);
    }

    let event = classify_event(&body)?;

    match event.kind {
        GatewayEventKind::ChallengeRequest => {
            // Liveness probe: echo the challenge, touch nothing.
            let challenge = event.challenge.clone().unwrap_or_default();
            return Ok(Json(json!({ "challenge": challenge })));
        }
        GatewayEventKind::Ignored => {
            tracing::debug!("Ignoring unhandled gateway event");
            return Ok(Json(json!({ "received": true })));
        }
        GatewayEventKind::ChargeSucceeded => {
            apply_charge(&state, &event, ChargeOutcome::Success)?;
        }
        GatewayEventKind::ChargeFailed => {
            apply_charge(&state, &event, ChargeOutcome::Failure)?;
        }
        GatewayEventKind::TransferSucceeded => {
            let mut conn = state.db.get()?;
            if let TransferResult::Applied(w) =
                withdrawal::complete_transfer(&mut conn, &event.reference)?
            {
                state.notifier.send(
                    NotificationRequest::new(&w.user_id, "withdrawal.completed")
                        .withdrawal(&w.id)
                        .amount(w.amount_cents),
                );
            }
        }
        GatewayEventKind::TransferFailed => {
            let mut conn = state.db.get()?;
            if let TransferResult::Applied(w) = withdrawal::fail_transfer(
                &mut conn,
                &event.reference,
                event.failure_reason.as_deref(),
            )? {
                state.notifier.send(
                    NotificationRequest::new(&w.user_id, "withdrawal.failed")
                        .withdrawal(&w.id)
                        .amount(w.amount_cents),
                );
            }
        }
        GatewayEventKind::TransferReversed => {
            let mut conn = state.db.get()?;
            if let TransferResult::Applied(w) =
                withdrawal::reverse_transfer(&mut conn, &event.reference)?
            {
                state.notifier.send(
                    NotificationRequest::new(&w.user_id, "withdrawal.reversed")
                        .withdrawal(&w.id)
                        .amount(w.amount_cents),
                );
            }
        }
    }

    Ok(Json(json!({ "received": true })))
}

fn apply_charge(state: &AppState, event: &GatewayEvent, outcome: ChargeOutcome) -> Result<()> {
    let mut conn = state.db.get()?;

    let event_id = if event.transaction_id.is_empty() {
        None
    } else {
        Some(event.transaction_id.as_str())
    };

    let result = payment::apply_gateway_charge_event(
        &mut conn,
        &event.reference,
        outcome,
        event.failure_reason.as_deref(),
        event_id,
        event_id,
    )?;

    if let ChargeResult::Applied(p) = result {
        match outcome {
            ChargeOutcome::Success => {
                state.notifier.send(
                    NotificationRequest::new(&p.buyer_id, "payment.escrowed")
                        .payment(&p.id)
                        .amount(p.amount_cents),
                );
                state.notifier.send(
                    NotificationRequest::new(&p.seller_id, "payment.escrowed")
                        .payment(&p.id)
                        .amount(p.amount_cents),
                );
            }
            ChargeOutcome::Failure => {
                state
                    .notifier
                    .send(NotificationRequest::new(&p.buyer_id, "payment.failed").payment(&p.id));
            }
        }
    }

    Ok(())
}
