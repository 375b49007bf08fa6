//! Admin-only payment actions.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::post,
    Json, Router,
};

use crate::auth;
use crate::db::AppState;
use crate::engine::payment;
use crate::error::Result;
use crate::models::{Actor, Payment};

use super::payments::{notify_refunded, notify_released};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/payments/{id}/release", post(release_payment))
        .route("/admin/payments/{id}/refund", post(refund_payment))
}

async fn release_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Payment>> {
    let mut conn = state.db.get()?;
    let admin = auth::authenticate_admin(&conn, &headers)?;
    let actor = Actor::Admin(admin.id);

    let updated = payment::release(&mut conn, &id, &actor)?;

    notify_released(&state, &updated);
    Ok(Json(updated))
}

async fn refund_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Payment>> {
    let mut conn = state.db.get()?;
    let admin = auth::authenticate_admin(&conn, &headers)?;
    let actor = Actor::Admin(admin.id);

    let updated = payment::refund(&mut conn, &id, &actor)?;

    notify_refunded(&state, &updated);
    Ok(Json(updated))
}
