use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};

use crate::auth;
use crate::db::{queries, AppState};
use crate::engine::payment;
use crate::error::{msg, AppError, OptionExt, Result};
use crate::models::{Actor, Payment};
use crate::notify::NotificationRequest;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/payments/{id}/confirm-receipt", post(confirm_receipt))
        .route("/payments/{id}", get(get_payment))
}

/// Buyer confirms receipt, releasing the escrowed funds to the seller.
async fn confirm_receipt(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Payment>> {
    let mut conn = state.db.get()?;
    let actor = auth::authenticate_actor(&conn, &headers)?;

    let updated = payment::confirm_receipt(&mut conn, &id, &actor)?;

    notify_released(&state, &updated);
    Ok(Json(updated))
}

/// Fetch a payment. Visible to its buyer, its seller, and admins.
async fn get_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Payment>> {
    let conn = state.db.get()?;
    let actor = auth::authenticate_actor(&conn, &headers)?;

    let payment = queries::get_payment_by_id(&conn, &id)?.or_not_found(msg::PAYMENT_NOT_FOUND)?;

    let allowed = match &actor {
        Actor::Admin(_) => true,
        Actor::Buyer(uid) => uid == &payment.buyer_id,
        Actor::Seller(uid) => uid == &payment.seller_id,
    };
    if !allowed {
        return Err(AppError::Forbidden(msg::NOT_PARTY_TO_PAYMENT.into()));
    }

    Ok(Json(payment))
}

pub(super) fn notify_released(state: &AppState, payment: &Payment) {
    let net = payment.amount_cents - payment.platform_fee_charged_cents.unwrap_or(0);
    state.notifier.send(
        NotificationRequest::new(&payment.seller_id, "payment.released")
            .payment(&payment.id)
            .amount(net),
    );
    state.notifier.send(
        NotificationRequest::new(&payment.buyer_id, "payment.released").payment(&payment.id),
    );
}

pub(super) fn notify_refunded(state: &AppState, payment: &Payment) {
    state.notifier.send(
        NotificationRequest::new(&payment.buyer_id, "payment.refunded")
            .payment(&payment.id)
            .amount(payment.amount_cents),
    );
    state.notifier.send(
        NotificationRequest::new(&payment.seller_id, "payment.refunded").payment(&payment.id),
    );
}
