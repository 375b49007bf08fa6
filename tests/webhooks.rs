//! Webhook ingestion tests - signature verification, challenge handling,
//! event dispatch, and replay behavior over the HTTP surface.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::*;
use escrowd::handlers;

fn signed_webhook(body: &Value) -> Request<Body> {
    let raw = serde_json::to_vec(body).unwrap();
    let signature = sign(TEST_WEBHOOK_SECRET, &raw);
    Request::builder()
        .method("POST")
        .uri("/webhook/gateway")
        .header("content-type", "application/json")
        .header("x-gateway-signature", signature)
        .body(Body::from(raw))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn charge_succeeded_escrows_payment() {
    let state = create_test_app_state();
    let payment_id = {
        let conn = state.db.get().unwrap();
        let (buyer, _) = create_test_user(&conn, "Buyer", UserRole::Buyer);
        let (seller, _) = create_test_user(&conn, "Seller", UserRole::Seller);
        let item = create_test_item(&conn, &seller.id, 10_000, 1);
        create_test_payment(&conn, &item, &buyer.id, 10_000).id
    };

    let app = handlers::router(state.clone());
    let response = app
        .oneshot(signed_webhook(&json!({
            "event": "charge.succeeded",
            "transaction_id": "txn_123",
            "reference": payment_id,
            "amount_cents": 10_000,
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await, json!({ "received": true }));

    let payment = get_payment(&state.db, &payment_id);
    assert_eq!(payment.status, PaymentStatus::SuccessfulEscrow);
    assert_eq!(payment.gateway_transaction_id.as_deref(), Some("txn_123"));
}

#[tokio::test]
async fn missing_signature_returns_401() {
    let state = create_test_app_state();
    let app = handlers::router(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhook/gateway")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"event":"charge.succeeded"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_signature_is_rejected_without_side_effects() {
    let state = create_test_app_state();
    let payment_id = {
        let conn = state.db.get().unwrap();
        let (buyer, _) = create_test_user(&conn, "Buyer", UserRole::Buyer);
        let (seller, _) = create_test_user(&conn, "Seller", UserRole::Seller);
        let item = create_test_item(&conn, &seller.id, 10_000, 1);
        create_test_payment(&conn, &item, &buyer.id, 10_000).id
    };

    let body = serde_json::to_vec(&json!({
        "event": "charge.succeeded",
        "transaction_id": "txn_123",
        "reference": payment_id,
    }))
    .unwrap();
    let bad_signature = sign("wrong-secret", &body);

    let app = handlers::router(state.clone());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhook/gateway")
                .header("content-type", "application/json")
                .header("x-gateway-signature", bad_signature)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        get_payment(&state.db, &payment_id).status,
        PaymentStatus::Initiated,
        "rejected webhook must not mutate state"
    );
}

/// A correctly signed body that is not JSON is a caller bug, not a replay;
/// it gets 400 rather than an acknowledgement.
#[tokio::test]
async fn unparseable_body_returns_400() {
    let state = create_test_app_state();
    let app = handlers::router(state);

    let raw = b"not json at all {{{".to_vec();
    let signature = sign(TEST_WEBHOOK_SECRET, &raw);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhook/gateway")
                .header("content-type", "application/json")
                .header("x-gateway-signature", signature)
                .body(Body::from(raw))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn challenge_is_echoed_synchronously() {
    let state = create_test_app_state();
    let app = handlers::router(state);

    let response = app
        .oneshot(signed_webhook(&json!({
            "event": "challenge",
            "challenge": "abc-123",
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await, json!({ "challenge": "abc-123" }));
}

#[tokio::test]
async fn unknown_event_is_acknowledged_and_dropped() {
    let state = create_test_app_state();
    let app = handlers::router(state);

    let response = app
        .oneshot(signed_webhook(&json!({
            "event": "customer.updated",
            "transaction_id": "txn_999",
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await, json!({ "received": true }));
}

#[tokio::test]
async fn replayed_charge_event_is_acknowledged_but_inert() {
    let state = create_test_app_state();
    let (payment_id, seller_id) = {
        let conn = state.db.get().unwrap();
        let (buyer, _) = create_test_user(&conn, "Buyer", UserRole::Buyer);
        let (seller, _) = create_test_user(&conn, "Seller", UserRole::Seller);
        let item = create_test_item(&conn, &seller.id, 10_000, 1);
        (create_test_payment(&conn, &item, &buyer.id, 10_000).id, seller.id)
    };

    let event = json!({
        "event": "charge.succeeded",
        "transaction_id": "txn_once",
        "reference": payment_id,
    });

    for _ in 0..3 {
        let app = handlers::router(state.clone());
        let response = app.oneshot(signed_webhook(&event)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(
        get_payment(&state.db, &payment_id).status,
        PaymentStatus::SuccessfulEscrow
    );
    assert_eq!(balance_of(&state.db, &seller_id), 0);
}

#[tokio::test]
async fn charge_for_unknown_payment_returns_404() {
    let state = create_test_app_state();
    let app = handlers::router(state);

    let response = app
        .oneshot(signed_webhook(&json!({
            "event": "charge.succeeded",
            "transaction_id": "txn_1",
            "reference": "no-such-payment",
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn transfer_succeeded_completes_withdrawal() {
    let state = create_test_app_state();
    let (seller_id, transfer_id) = {
        let conn = state.db.get().unwrap();
        let (seller, _) = create_test_user(&conn, "Seller", UserRole::Seller);
        queries::credit_balance(&conn, &seller.id, 40_000).unwrap();
        queries::debit_balance(&conn, &seller.id, 40_000).unwrap();
        let withdrawal = queries::create_withdrawal(&conn, &seller.id, 40_000).unwrap();
        queries::mark_withdrawal_processing(&conn, &withdrawal.id, "trf_42").unwrap();
        (seller.id, "trf_42".to_string())
    };

    let app = handlers::router(state.clone());
    let response = app
        .oneshot(signed_webhook(&json!({
            "event": "transfer.succeeded",
            "transaction_id": "evt_trf_1",
            "reference": transfer_id,
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let conn = state.db.get().unwrap();
    let withdrawal = queries::get_withdrawal_by_transfer_id(&conn, &transfer_id)
        .unwrap()
        .unwrap();
    assert_eq!(withdrawal.status, WithdrawalStatus::Completed);
    drop(conn);
    // The debited balance stays gone.
    assert_eq!(balance_of(&state.db, &seller_id), 0);
}
