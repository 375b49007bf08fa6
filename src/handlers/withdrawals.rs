use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use crate::auth;
use crate::db::AppState;
use crate::engine::withdrawal;
use crate::error::{AppError, Result};
use crate::models::{UserRole, Withdrawal};
use crate::notify::NotificationRequest;

pub fn router() -> Router<AppState> {
    Router::new().route("/withdrawals", post(request_withdrawal))
}

#[derive(Debug, Deserialize)]
struct WithdrawalRequest {
    amount_cents: i64,
}

async fn request_withdrawal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<WithdrawalRequest>,
) -> Result<(StatusCode, Json<Withdrawal>)> {
    let user = {
        let conn = state.db.get()?;
        auth::authenticate(&conn, &headers)?
    };
    if !matches!(user.role, UserRole::Seller | UserRole::Admin) {
        return Err(AppError::Forbidden(
            "Only sellers can request withdrawals".into(),
        ));
    }

    let created = withdrawal::request(&state.db, &state.gateway, &user, req.amount_cents).await?;

    state.notifier.send(
        NotificationRequest::new(&user.id, "withdrawal.requested")
            .withdrawal(&created.id)
            .amount(created.amount_cents),
    );

    Ok((StatusCode::CREATED, Json(created)))
}
