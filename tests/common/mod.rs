//! Test utilities and fixtures for escrowd integration tests

#![allow(dead_code)]

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::sync::Arc;

pub use escrowd::db::{init_db, queries, AppState, DbPool};
pub use escrowd::engine;
pub use escrowd::gateway::{sign, GatewayClient};
pub use escrowd::models::*;
pub use escrowd::notify::Notifier;

pub const TEST_WEBHOOK_SECRET: &str = "test-webhook-secret";

/// Default platform fee used by tests: 5%.
pub const TEST_DEFAULT_FEE_BPS: i64 = 500;

/// Create a pooled in-memory test database with schema and platform
/// settings initialized. Pool size 1 so every checkout sees the same
/// in-memory database.
pub fn setup_test_pool() -> DbPool {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder().max_size(1).build(manager).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
        queries::ensure_platform_settings(&conn, TEST_DEFAULT_FEE_BPS).unwrap();
    }
    pool
}

/// Create an AppState for testing. The gateway client points at a closed
/// local port so any outbound transfer initiation fails fast.
pub fn create_test_app_state() -> AppState {
    AppState {
        db: setup_test_pool(),
        webhook_secret: TEST_WEBHOOK_SECRET.to_string(),
        gateway: Arc::new(GatewayClient::new("http://127.0.0.1:9", "test-gw-key")),
        notifier: Arc::new(Notifier::new(None)),
    }
}

/// Create a test user, returning the user and its plaintext API key.
pub fn create_test_user(
    conn: &rusqlite::Connection,
    name: &str,
    role: UserRole,
) -> (User, String) {
    let api_key = queries::generate_api_key();
    let user = queries::create_user(
        conn,
        &CreateUser {
            name: name.to_string(),
            role,
        },
        &api_key,
    )
    .expect("Failed to create test user");
    (user, api_key)
}

pub fn create_test_item(
    conn: &rusqlite::Connection,
    seller_id: &str,
    price_cents: i64,
    quantity: i64,
) -> Item {
    queries::create_item(
        conn,
        &CreateItem {
            seller_id: seller_id.to_string(),
            title: "Test Item".to_string(),
            price_cents,
            quantity,
        },
    )
    .expect("Failed to create test item")
}

pub fn create_test_payment(
    conn: &rusqlite::Connection,
    item: &Item,
    buyer_id: &str,
    amount_cents: i64,
) -> Payment {
    queries::create_payment(
        conn,
        &CreatePayment {
            item_id: item.id.clone(),
            buyer_id: buyer_id.to_string(),
            seller_id: item.seller_id.clone(),
            amount_cents,
            currency: "USD".to_string(),
            gateway: "testpay".to_string(),
        },
    )
    .expect("Failed to create test payment")
}

/// Drive a payment from INITIATED into SUCCESSFUL_ESCROW via the engine,
/// as a successful charge webhook would.
pub fn escrow_payment(pool: &DbPool, payment_id: &str) -> Payment {
    let mut conn = pool.get().unwrap();
    match engine::payment::apply_gateway_charge_event(
        &mut conn,
        payment_id,
        ChargeOutcome::Success,
        None,
        Some(&format!("txn_{}", payment_id)),
        Some(&format!("evt_{}", payment_id)),
    )
    .expect("Failed to apply charge event")
    {
        engine::payment::ChargeResult::Applied(p) => p,
        engine::payment::ChargeResult::AlreadyProcessed(p) => p,
    }
}

/// Full fixture: buyer, seller, item, and a payment already in escrow.
pub struct EscrowFixture {
    pub buyer: User,
    pub buyer_key: String,
    pub seller: User,
    pub seller_key: String,
    pub item: Item,
    pub payment: Payment,
}

pub fn setup_escrowed_payment(pool: &DbPool, amount_cents: i64) -> EscrowFixture {
    let (buyer, buyer_key, seller, seller_key, item, payment) = {
        let conn = pool.get().unwrap();
        let (buyer, buyer_key) = create_test_user(&conn, "Test Buyer", UserRole::Buyer);
        let (seller, seller_key) = create_test_user(&conn, "Test Seller", UserRole::Seller);
        let item = create_test_item(&conn, &seller.id, amount_cents, 1);
        let payment = create_test_payment(&conn, &item, &buyer.id, amount_cents);
        (buyer, buyer_key, seller, seller_key, item, payment)
    };
    let payment = escrow_payment(pool, &payment.id);

    EscrowFixture {
        buyer,
        buyer_key,
        seller,
        seller_key,
        item,
        payment,
    }
}

pub fn get_payment(pool: &DbPool, id: &str) -> Payment {
    let conn = pool.get().unwrap();
    queries::get_payment_by_id(&conn, id)
        .unwrap()
        .expect("payment should exist")
}

pub fn get_user(pool: &DbPool, id: &str) -> User {
    let conn = pool.get().unwrap();
    queries::get_user_by_id(&conn, id)
        .unwrap()
        .expect("user should exist")
}

pub fn get_item(pool: &DbPool, id: &str) -> Item {
    let conn = pool.get().unwrap();
    queries::get_item_by_id(&conn, id)
        .unwrap()
        .expect("item should exist")
}

pub fn balance_of(pool: &DbPool, user_id: &str) -> i64 {
    get_user(pool, user_id).available_balance_cents
}

pub fn platform_fee_total(pool: &DbPool) -> i64 {
    let conn = pool.get().unwrap();
    queries::get_platform_settings(&conn)
        .unwrap()
        .expect("platform settings should exist")
        .total_platform_fees_cents
}
