//! Dispute workflow tests - filing, single-open-dispute invariant,
//! resolution, and administrative close.

mod common;

use common::*;
use escrowd::engine::dispute::{self, DisputeOutcome, FileDispute};
use escrowd::error::AppError;

fn file_request(payment_id: &str, reason: &str) -> FileDispute {
    FileDispute {
        payment_id: payment_id.to_string(),
        reason: reason.to_string(),
        description: Some("Test description".to_string()),
    }
}

#[test]
fn buyer_files_dispute_on_escrowed_payment() {
    let pool = setup_test_pool();
    let fx = setup_escrowed_payment(&pool, 10_000);

    let buyer = Actor::Buyer(fx.buyer.id.clone());
    let dispute = {
        let mut conn = pool.get().unwrap();
        dispute::file(&mut conn, &buyer, &file_request(&fx.payment.id, "Item damaged")).unwrap()
    };

    assert_eq!(dispute.status, DisputeStatus::PendingAdmin);
    assert_eq!(dispute.filed_by_user_id, fx.buyer.id);
    assert_eq!(dispute.other_party_user_id, fx.seller.id);

    let payment = get_payment(&pool, &fx.payment.id);
    assert_eq!(payment.status, PaymentStatus::Disputed);
    assert_eq!(payment.active_dispute_id.as_deref(), Some(dispute.id.as_str()));
    assert_eq!(get_item(&pool, &fx.item.id).status, ItemStatus::Disputed);
}

#[test]
fn seller_can_also_file() {
    let pool = setup_test_pool();
    let fx = setup_escrowed_payment(&pool, 10_000);

    let seller = Actor::Seller(fx.seller.id.clone());
    let mut conn = pool.get().unwrap();
    let dispute =
        dispute::file(&mut conn, &seller, &file_request(&fx.payment.id, "Buyer unresponsive"))
            .unwrap();

    assert_eq!(dispute.filed_by_user_id, fx.seller.id);
    assert_eq!(dispute.other_party_user_id, fx.buyer.id);
}

#[test]
fn second_open_dispute_is_rejected() {
    let pool = setup_test_pool();
    let fx = setup_escrowed_payment(&pool, 10_000);

    let buyer = Actor::Buyer(fx.buyer.id.clone());
    let seller = Actor::Seller(fx.seller.id.clone());

    let mut conn = pool.get().unwrap();
    dispute::file(&mut conn, &buyer, &file_request(&fx.payment.id, "Item damaged")).unwrap();

    let err = dispute::file(&mut conn, &seller, &file_request(&fx.payment.id, "Disagree"))
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[test]
fn stranger_cannot_file() {
    let pool = setup_test_pool();
    let fx = setup_escrowed_payment(&pool, 10_000);

    let stranger = Actor::Buyer("someone-else".to_string());
    let mut conn = pool.get().unwrap();
    let err =
        dispute::file(&mut conn, &stranger, &file_request(&fx.payment.id, "Not mine")).unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[test]
fn initiated_payment_is_not_disputable() {
    let pool = setup_test_pool();
    let (buyer_id, payment_id) = {
        let conn = pool.get().unwrap();
        let (buyer, _) = create_test_user(&conn, "Buyer", UserRole::Buyer);
        let (seller, _) = create_test_user(&conn, "Seller", UserRole::Seller);
        let item = create_test_item(&conn, &seller.id, 10_000, 1);
        let payment = create_test_payment(&conn, &item, &buyer.id, 10_000);
        (buyer.id, payment.id)
    };

    let buyer = Actor::Buyer(buyer_id);
    let mut conn = pool.get().unwrap();
    let err = dispute::file(&mut conn, &buyer, &file_request(&payment_id, "Too early")).unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[test]
fn resolve_refund_restores_pre_sale_state() {
    let pool = setup_test_pool();
    let fx = setup_escrowed_payment(&pool, 25_000);

    let buyer = Actor::Buyer(fx.buyer.id.clone());
    let admin = Actor::Admin("admin-1".to_string());

    let dispute_id = {
        let mut conn = pool.get().unwrap();
        dispute::file(&mut conn, &buyer, &file_request(&fx.payment.id, "Item damaged"))
            .unwrap()
            .id
    };

    let (resolved, payment) = {
        let mut conn = pool.get().unwrap();
        dispute::resolve(
            &mut conn,
            &dispute_id,
            DisputeOutcome::Refund,
            Some("Photos confirm damage"),
            &admin,
        )
        .unwrap()
    };

    assert_eq!(resolved.status, DisputeStatus::ResolvedRefund);
    assert_eq!(
        resolved.resolution_notes.as_deref(),
        Some("Photos confirm damage")
    );
    assert!(resolved.resolved_at.is_some());

    assert_eq!(payment.status, PaymentStatus::RefundedToBuyer);
    assert_eq!(payment.active_dispute_id, None);
    assert_eq!(balance_of(&pool, &fx.buyer.id), 25_000);
    assert_eq!(balance_of(&pool, &fx.seller.id), 0);
    assert_eq!(platform_fee_total(&pool), 0);

    let item = get_item(&pool, &fx.item.id);
    assert_eq!(item.status, ItemStatus::Available);
    assert_eq!(item.quantity, 1);
}

#[test]
fn resolve_release_pays_seller_with_fee() {
    let pool = setup_test_pool();
    let fx = setup_escrowed_payment(&pool, 100_000);

    let buyer = Actor::Buyer(fx.buyer.id.clone());
    let admin = Actor::Admin("admin-1".to_string());

    let dispute_id = {
        let mut conn = pool.get().unwrap();
        dispute::file(&mut conn, &buyer, &file_request(&fx.payment.id, "Changed my mind"))
            .unwrap()
            .id
    };

    let (resolved, payment) = {
        let mut conn = pool.get().unwrap();
        dispute::resolve(&mut conn, &dispute_id, DisputeOutcome::ReleasePayment, None, &admin)
            .unwrap()
    };

    assert_eq!(resolved.status, DisputeStatus::ResolvedReleasePayment);
    assert_eq!(payment.status, PaymentStatus::ReleasedToSeller);

    // Default fee is 5%.
    assert_eq!(payment.platform_fee_charged_cents, Some(5_000));
    assert_eq!(balance_of(&pool, &fx.seller.id), 95_000);
    assert_eq!(platform_fee_total(&pool), 5_000);
}

#[test]
fn dispute_cannot_be_resolved_twice() {
    let pool = setup_test_pool();
    let fx = setup_escrowed_payment(&pool, 10_000);

    let buyer = Actor::Buyer(fx.buyer.id.clone());
    let admin = Actor::Admin("admin-1".to_string());

    let mut conn = pool.get().unwrap();
    let dispute =
        dispute::file(&mut conn, &buyer, &file_request(&fx.payment.id, "Item damaged")).unwrap();

    dispute::resolve(&mut conn, &dispute.id, DisputeOutcome::Refund, None, &admin).unwrap();
    drop(conn);
    let buyer_balance = balance_of(&pool, &fx.buyer.id);

    let mut conn = pool.get().unwrap();
    let err = dispute::resolve(&mut conn, &dispute.id, DisputeOutcome::ReleasePayment, None, &admin)
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    drop(conn);

    // The replayed resolution moved no money.
    assert_eq!(balance_of(&pool, &fx.buyer.id), buyer_balance);
    assert_eq!(balance_of(&pool, &fx.seller.id), 0);
}

#[test]
fn only_admins_resolve() {
    let pool = setup_test_pool();
    let fx = setup_escrowed_payment(&pool, 10_000);

    let buyer = Actor::Buyer(fx.buyer.id.clone());
    let mut conn = pool.get().unwrap();
    let dispute =
        dispute::file(&mut conn, &buyer, &file_request(&fx.payment.id, "Item damaged")).unwrap();

    let err = dispute::resolve(&mut conn, &dispute.id, DisputeOutcome::Refund, None, &buyer)
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[test]
fn close_returns_payment_to_escrow() {
    let pool = setup_test_pool();
    let fx = setup_escrowed_payment(&pool, 10_000);

    let buyer = Actor::Buyer(fx.buyer.id.clone());
    let admin = Actor::Admin("admin-1".to_string());

    let dispute_id = {
        let mut conn = pool.get().unwrap();
        dispute::file(&mut conn, &buyer, &file_request(&fx.payment.id, "Misclick"))
            .unwrap()
            .id
    };

    let closed = {
        let mut conn = pool.get().unwrap();
        dispute::close(&mut conn, &dispute_id, Some("Filed in error"), &admin).unwrap()
    };
    assert_eq!(closed.status, DisputeStatus::Closed);

    let payment = get_payment(&pool, &fx.payment.id);
    assert_eq!(payment.status, PaymentStatus::SuccessfulEscrow);
    assert_eq!(payment.active_dispute_id, None);
    assert_eq!(get_item(&pool, &fx.item.id).status, ItemStatus::PaidEscrow);

    // The payment is disputable again.
    let mut conn = pool.get().unwrap();
    let second =
        dispute::file(&mut conn, &buyer, &file_request(&fx.payment.id, "Real problem")).unwrap();
    assert_eq!(second.status, DisputeStatus::PendingAdmin);
}
