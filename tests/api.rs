//! HTTP API tests - bearer auth, role enforcement, and the typed error
//! taxonomy over the public endpoints.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::*;
use escrowd::handlers;

fn post_json(uri: &str, api_key: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", api_key))
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

fn post_empty(uri: &str, api_key: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer {}", api_key))
        .body(Body::empty())
        .unwrap()
}

fn get_with_key(uri: &str, api_key: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("authorization", format!("Bearer {}", api_key))
        .body(Body::empty())
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn missing_bearer_token_returns_401() {
    let state = create_test_app_state();
    let app = handlers::router(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/payments/some-id")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_api_key_returns_401() {
    let state = create_test_app_state();
    let app = handlers::router(state);

    let response = app
        .oneshot(get_with_key("/payments/some-id", "esk_not_a_real_key"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn buyer_confirms_receipt_over_http() {
    let state = create_test_app_state();
    let fx = setup_escrowed_payment(&state.db, 10_000);

    let app = handlers::router(state.clone());
    let response = app
        .oneshot(post_empty(
            &format!("/payments/{}/confirm-receipt", fx.payment.id),
            &fx.buyer_key,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "RELEASED_TO_SELLER");
    assert!(balance_of(&state.db, &fx.seller.id) > 0);
}

#[tokio::test]
async fn seller_cannot_confirm_receipt() {
    let state = create_test_app_state();
    let fx = setup_escrowed_payment(&state.db, 10_000);

    let app = handlers::router(state);
    let response = app
        .oneshot(post_empty(
            &format!("/payments/{}/confirm-receipt", fx.payment.id),
            &fx.seller_key,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn payment_visibility_is_scoped_to_parties() {
    let state = create_test_app_state();
    let fx = setup_escrowed_payment(&state.db, 10_000);
    let (admin_key, stranger_key) = {
        let conn = state.db.get().unwrap();
        let (_, admin_key) = create_test_user(&conn, "Admin", UserRole::Admin);
        let (_, stranger_key) = create_test_user(&conn, "Stranger", UserRole::Buyer);
        (admin_key, stranger_key)
    };

    let uri = format!("/payments/{}", fx.payment.id);
    for key in [&fx.buyer_key, &fx.seller_key, &admin_key] {
        let app = handlers::router(state.clone());
        let response = app.oneshot(get_with_key(&uri, key)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let app = handlers::router(state.clone());
    let response = app.oneshot(get_with_key(&uri, &stranger_key)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_endpoints_reject_non_admins() {
    let state = create_test_app_state();
    let fx = setup_escrowed_payment(&state.db, 10_000);

    for uri in [
        format!("/admin/payments/{}/release", fx.payment.id),
        format!("/admin/payments/{}/refund", fx.payment.id),
    ] {
        let app = handlers::router(state.clone());
        let response = app.oneshot(post_empty(&uri, &fx.buyer_key)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{} should 403", uri);
    }

    // State is untouched.
    assert_eq!(
        get_payment(&state.db, &fx.payment.id).status,
        PaymentStatus::SuccessfulEscrow
    );
}

#[tokio::test]
async fn admin_refund_over_http() {
    let state = create_test_app_state();
    let fx = setup_escrowed_payment(&state.db, 20_000);
    let admin_key = {
        let conn = state.db.get().unwrap();
        create_test_user(&conn, "Admin", UserRole::Admin).1
    };

    let app = handlers::router(state.clone());
    let response = app
        .oneshot(post_empty(
            &format!("/admin/payments/{}/refund", fx.payment.id),
            &admin_key,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(balance_of(&state.db, &fx.buyer.id), 20_000);
}

#[tokio::test]
async fn release_of_unknown_payment_returns_404() {
    let state = create_test_app_state();
    let admin_key = {
        let conn = state.db.get().unwrap();
        create_test_user(&conn, "Admin", UserRole::Admin).1
    };

    let app = handlers::router(state);
    let response = app
        .oneshot(post_empty("/admin/payments/nope/release", &admin_key))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dispute_filing_and_resolution_over_http() {
    let state = create_test_app_state();
    let fx = setup_escrowed_payment(&state.db, 10_000);
    let admin_key = {
        let conn = state.db.get().unwrap();
        create_test_user(&conn, "Admin", UserRole::Admin).1
    };

    let app = handlers::router(state.clone());
    let response = app
        .oneshot(post_json(
            "/disputes",
            &fx.buyer_key,
            &json!({
                "payment_id": fx.payment.id,
                "reason": "Item damaged",
                "description": "Arrived cracked",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let dispute = response_json(response).await;
    assert_eq!(dispute["status"], "PENDING_ADMIN");
    let dispute_id = dispute["id"].as_str().unwrap().to_string();

    // Filing again conflicts.
    let app = handlers::router(state.clone());
    let response = app
        .oneshot(post_json(
            "/disputes",
            &fx.seller_key,
            &json!({ "payment_id": fx.payment.id, "reason": "Counter" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Admin resolves as refund.
    let app = handlers::router(state.clone());
    let response = app
        .oneshot(post_json(
            &format!("/admin/disputes/{}/resolve", dispute_id),
            &admin_key,
            &json!({ "outcome": "refund", "notes": "Buyer is right" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["dispute"]["status"], "RESOLVED_REFUND");
    assert_eq!(body["payment"]["status"], "REFUNDED_TO_BUYER");
    assert_eq!(balance_of(&state.db, &fx.buyer.id), 10_000);
}

#[tokio::test]
async fn blank_dispute_reason_is_rejected() {
    let state = create_test_app_state();
    let fx = setup_escrowed_payment(&state.db, 10_000);

    let app = handlers::router(state);
    let response = app
        .oneshot(post_json(
            "/disputes",
            &fx.buyer_key,
            &json!({ "payment_id": fx.payment.id, "reason": "   " }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn withdrawal_with_insufficient_balance_returns_409() {
    let state = create_test_app_state();
    let seller_key = {
        let conn = state.db.get().unwrap();
        create_test_user(&conn, "Seller", UserRole::Seller).1
    };

    let app = handlers::router(state);
    let response = app
        .oneshot(post_json(
            "/withdrawals",
            &seller_key,
            &json!({ "amount_cents": 5_000 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn buyers_cannot_withdraw() {
    let state = create_test_app_state();
    let buyer_key = {
        let conn = state.db.get().unwrap();
        create_test_user(&conn, "Buyer", UserRole::Buyer).1
    };

    let app = handlers::router(state);
    let response = app
        .oneshot(post_json(
            "/withdrawals",
            &buyer_key,
            &json!({ "amount_cents": 5_000 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
