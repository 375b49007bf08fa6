//! HTTP surface. Handlers authenticate, delegate to the engine, and emit
//! post-commit notifications; no business rules live here.

mod admin;
mod disputes;
mod payments;
mod webhooks;
mod withdrawals;

use axum::Router;

use crate::db::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(webhooks::router())
        .merge(payments::router())
        .merge(admin::router())
        .merge(disputes::router())
        .merge(withdrawals::router())
        .with_state(state)
}
