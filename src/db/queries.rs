use chrono::Utc;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::auth::hash_api_key;
use crate::error::{msg, AppError, Result};
use crate::models::*;

use super::from_row::{
    query_all, query_one, DISPUTE_COLS, EARNING_COLS, FEE_RULE_COLS, ITEM_COLS, PAYMENT_COLS,
    PLATFORM_FEE_COLS, PLATFORM_SETTINGS_COLS, USER_COLS, WITHDRAWAL_COLS,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a fresh bearer API key. Only the salted hash is persisted.
pub fn generate_api_key() -> String {
    format!("esk_{}", Uuid::new_v4().simple())
}

// ============ Users ============

pub fn create_user(conn: &Connection, input: &CreateUser, api_key: &str) -> Result<User> {
    let id = gen_id();
    let now = now();
    let key_hash = hash_api_key(api_key);

    conn.execute(
        "INSERT INTO users (id, name, role, api_key_hash, available_balance_cents, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)",
        params![&id, &input.name, input.role.as_str(), &key_hash, now, now],
    )?;

    Ok(User {
        id,
        name: input.name.clone(),
        role: input.role,
        api_key_hash: key_hash,
        available_balance_cents: 0,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        &[&id],
    )
}

pub fn get_user_by_api_key(conn: &Connection, api_key: &str) -> Result<Option<User>> {
    let key_hash = hash_api_key(api_key);
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE api_key_hash = ?1", USER_COLS),
        &[&key_hash],
    )
}

/// Credit a user's available balance in place.
pub fn credit_balance(conn: &Connection, user_id: &str, amount_cents: i64) -> Result<()> {
    let affected = conn.execute(
        "UPDATE users SET available_balance_cents = available_balance_cents + ?1, updated_at = ?2
         WHERE id = ?3",
        params![amount_cents, now(), user_id],
    )?;
    if affected == 0 {
        return Err(AppError::NotFound(msg::USER_NOT_FOUND.into()));
    }
    Ok(())
}

/// Debit a user's available balance. Fails with `Conflict` when the balance
/// would go negative; the guard lives in the WHERE clause so two concurrent
/// debits cannot both pass a stale in-memory check.
pub fn debit_balance(conn: &Connection, user_id: &str, amount_cents: i64) -> Result<()> {
    let affected = conn.execute(
        "UPDATE users SET available_balance_cents = available_balance_cents - ?1, updated_at = ?2
         WHERE id = ?3 AND available_balance_cents >= ?1",
        params![amount_cents, now(), user_id],
    )?;
    if affected == 0 {
        // Distinguish a missing user from an insufficient balance.
        if get_user_by_id(conn, user_id)?.is_none() {
            return Err(AppError::NotFound(msg::USER_NOT_FOUND.into()));
        }
        return Err(AppError::Conflict(msg::INSUFFICIENT_BALANCE.into()));
    }
    Ok(())
}

// ============ Items ============

pub fn create_item(conn: &Connection, input: &CreateItem) -> Result<Item> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO items (id, seller_id, title, price_cents, quantity, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 'AVAILABLE', ?6, ?7)",
        params![&id, &input.seller_id, &input.title, input.price_cents, input.quantity, now, now],
    )?;

    Ok(Item {
        id,
        seller_id: input.seller_id.clone(),
        title: input.title.clone(),
        price_cents: input.price_cents,
        quantity: input.quantity,
        status: ItemStatus::Available,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_item_by_id(conn: &Connection, id: &str) -> Result<Option<Item>> {
    query_one(
        conn,
        &format!("SELECT {} FROM items WHERE id = ?1", ITEM_COLS),
        &[&id],
    )
}

pub fn set_item_status(conn: &Connection, id: &str, status: ItemStatus) -> Result<()> {
    let affected = conn.execute(
        "UPDATE items SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now(), id],
    )?;
    if affected == 0 {
        return Err(AppError::NotFound(msg::ITEM_NOT_FOUND.into()));
    }
    Ok(())
}

/// Decrement stock by one (floor 0) and return the remaining quantity.
/// Callers decide what the listing status becomes.
pub fn sell_item_unit(conn: &Connection, id: &str) -> Result<i64> {
    let affected = conn.execute(
        "UPDATE items SET quantity = MAX(quantity - 1, 0), updated_at = ?1 WHERE id = ?2",
        params![now(), id],
    )?;
    if affected == 0 {
        return Err(AppError::NotFound(msg::ITEM_NOT_FOUND.into()));
    }
    conn.query_row(
        "SELECT quantity FROM items WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
    .map_err(Into::into)
}

/// Put one unit back on the shelf after a refund.
pub fn restock_item_unit(conn: &Connection, id: &str) -> Result<()> {
    let affected = conn.execute(
        "UPDATE items SET quantity = quantity + 1, status = 'AVAILABLE', updated_at = ?1
         WHERE id = ?2",
        params![now(), id],
    )?;
    if affected == 0 {
        return Err(AppError::NotFound(msg::ITEM_NOT_FOUND.into()));
    }
    Ok(())
}

// ============ Payments ============

pub fn create_payment(conn: &Connection, input: &CreatePayment) -> Result<Payment> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO payments (id, item_id, buyer_id, seller_id, amount_cents, currency, status,
                               gateway, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'INITIATED', ?7, ?8, ?9)",
        params![
            &id,
            &input.item_id,
            &input.buyer_id,
            &input.seller_id,
            input.amount_cents,
            &input.currency,
            &input.gateway,
            now,
            now
        ],
    )?;

    Ok(Payment {
        id,
        item_id: input.item_id.clone(),
        buyer_id: input.buyer_id.clone(),
        seller_id: input.seller_id.clone(),
        amount_cents: input.amount_cents,
        currency: input.currency.clone(),
        status: PaymentStatus::Initiated,
        gateway: input.gateway.clone(),
        gateway_transaction_id: None,
        platform_fee_charged_cents: None,
        active_dispute_id: None,
        failure_reason: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_payment_by_id(conn: &Connection, id: &str) -> Result<Option<Payment>> {
    query_one(
        conn,
        &format!("SELECT {} FROM payments WHERE id = ?1", PAYMENT_COLS),
        &[&id],
    )
}

/// INITIATED -> SUCCESSFUL_ESCROW, recording the provider transaction id.
pub fn mark_payment_escrowed(
    conn: &Connection,
    id: &str,
    gateway_transaction_id: Option<&str>,
) -> Result<()> {
    conn.execute(
        "UPDATE payments SET status = 'SUCCESSFUL_ESCROW',
                gateway_transaction_id = COALESCE(?1, gateway_transaction_id),
                updated_at = ?2
         WHERE id = ?3",
        params![gateway_transaction_id, now(), id],
    )?;
    Ok(())
}

/// INITIATED -> FAILED with the gateway's failure reason.
pub fn mark_payment_failed(
    conn: &Connection,
    id: &str,
    reason: &str,
    gateway_transaction_id: Option<&str>,
) -> Result<()> {
    conn.execute(
        "UPDATE payments SET status = 'FAILED', failure_reason = ?1,
                gateway_transaction_id = COALESCE(?2, gateway_transaction_id),
                updated_at = ?3
         WHERE id = ?4",
        params![reason, gateway_transaction_id, now(), id],
    )?;
    Ok(())
}

/// Terminal release: records the fee charged and clears any dispute link.
pub fn mark_payment_released(conn: &Connection, id: &str, fee_cents: i64) -> Result<()> {
    conn.execute(
        "UPDATE payments SET status = 'RELEASED_TO_SELLER',
                platform_fee_charged_cents = ?1, active_dispute_id = NULL, updated_at = ?2
         WHERE id = ?3",
        params![fee_cents, now(), id],
    )?;
    Ok(())
}

/// Terminal refund: the fee never applied, so it is cleared.
pub fn mark_payment_refunded(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(
        "UPDATE payments SET status = 'REFUNDED_TO_BUYER',
                platform_fee_charged_cents = NULL, active_dispute_id = NULL, updated_at = ?1
         WHERE id = ?2",
        params![now(), id],
    )?;
    Ok(())
}

pub fn mark_payment_disputed(conn: &Connection, id: &str, dispute_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE payments SET status = 'DISPUTED', active_dispute_id = ?1, updated_at = ?2
         WHERE id = ?3",
        params![dispute_id, now(), id],
    )?;
    Ok(())
}

/// Return a disputed payment to escrow (administrative dispute close).
pub fn clear_payment_dispute(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(
        "UPDATE payments SET status = 'SUCCESSFUL_ESCROW', active_dispute_id = NULL, updated_at = ?1
         WHERE id = ?2",
        params![now(), id],
    )?;
    Ok(())
}

// ============ Disputes ============

pub fn create_dispute(conn: &Connection, input: &CreateDispute) -> Result<Dispute> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO disputes (id, payment_id, item_id, filed_by_user_id, other_party_user_id,
                               reason, description, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'PENDING_ADMIN', ?8)",
        params![
            &id,
            &input.payment_id,
            &input.item_id,
            &input.filed_by_user_id,
            &input.other_party_user_id,
            &input.reason,
            &input.description,
            now
        ],
    )?;

    Ok(Dispute {
        id,
        payment_id: input.payment_id.clone(),
        item_id: input.item_id.clone(),
        filed_by_user_id: input.filed_by_user_id.clone(),
        other_party_user_id: input.other_party_user_id.clone(),
        reason: input.reason.clone(),
        description: input.description.clone(),
        status: DisputeStatus::PendingAdmin,
        resolution_notes: None,
        resolved_at: None,
        created_at: now,
    })
}

pub fn get_dispute_by_id(conn: &Connection, id: &str) -> Result<Option<Dispute>> {
    query_one(
        conn,
        &format!("SELECT {} FROM disputes WHERE id = ?1", DISPUTE_COLS),
        &[&id],
    )
}

pub fn get_open_dispute_for_payment(
    conn: &Connection,
    payment_id: &str,
) -> Result<Option<Dispute>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM disputes WHERE payment_id = ?1 AND status = 'PENDING_ADMIN'",
            DISPUTE_COLS
        ),
        &[&payment_id],
    )
}

pub fn close_dispute(
    conn: &Connection,
    id: &str,
    status: DisputeStatus,
    notes: Option<&str>,
) -> Result<()> {
    conn.execute(
        "UPDATE disputes SET status = ?1, resolution_notes = ?2, resolved_at = ?3
         WHERE id = ?4 AND status = 'PENDING_ADMIN'",
        params![status.as_str(), notes, now(), id],
    )?;
    Ok(())
}

// ============ Fee rules & platform settings ============

/// Active rules in evaluation order: priority descending, ties broken by
/// ascending minimum amount. The evaluator relies on this ordering.
pub fn list_active_fee_rules(conn: &Connection) -> Result<Vec<FeeRule>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM fee_rules WHERE is_active = 1
             ORDER BY priority DESC, min_amount_cents ASC",
            FEE_RULE_COLS
        ),
        &[],
    )
}

pub fn create_fee_rule(
    conn: &Connection,
    min_amount_cents: i64,
    max_amount_cents: Option<i64>,
    fee_bps: i64,
    priority: i64,
) -> Result<FeeRule> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO fee_rules (id, min_amount_cents, max_amount_cents, fee_bps, is_active, priority, created_at)
         VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6)",
        params![&id, min_amount_cents, max_amount_cents, fee_bps, priority, now],
    )?;

    Ok(FeeRule {
        id,
        min_amount_cents,
        max_amount_cents,
        fee_bps,
        is_active: true,
        priority,
        created_at: now,
    })
}

/// Create the singleton platform row if it does not exist yet.
pub fn ensure_platform_settings(conn: &Connection, default_fee_bps: i64) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO platform_settings (id, default_fee_bps, total_platform_fees_cents, updated_at)
         VALUES (?1, ?2, 0, ?3)",
        params![PlatformSettings::ROW_ID, default_fee_bps, now()],
    )?;
    Ok(())
}

pub fn get_platform_settings(conn: &Connection) -> Result<Option<PlatformSettings>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM platform_settings WHERE id = ?1",
            PLATFORM_SETTINGS_COLS
        ),
        &[&PlatformSettings::ROW_ID],
    )
}

/// Atomic in-database increment of the running fee total. Never
/// read-modify-write in application memory; concurrent releases must not
/// lose updates. Negative deltas are only used for payout reversals.
pub fn add_platform_fees(conn: &Connection, delta_cents: i64) -> Result<()> {
    let affected = conn.execute(
        "UPDATE platform_settings
         SET total_platform_fees_cents = total_platform_fees_cents + ?1, updated_at = ?2
         WHERE id = ?3",
        params![delta_cents, now(), PlatformSettings::ROW_ID],
    )?;
    if affected == 0 {
        return Err(AppError::Internal("Platform settings row missing".into()));
    }
    Ok(())
}

// ============ Ledger entries ============

pub fn create_platform_fee(
    conn: &Connection,
    amount_cents: i64,
    applied_fee_bps: i64,
    applied_fee_rule_id: Option<&str>,
    seller_id: &str,
    payment_id: &str,
    item_id: &str,
) -> Result<PlatformFee> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO platform_fees (id, amount_cents, applied_fee_bps, applied_fee_rule_id,
                                    seller_id, payment_id, item_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![&id, amount_cents, applied_fee_bps, applied_fee_rule_id, seller_id, payment_id, item_id, now],
    )?;

    Ok(PlatformFee {
        id,
        amount_cents,
        applied_fee_bps,
        applied_fee_rule_id: applied_fee_rule_id.map(String::from),
        seller_id: seller_id.to_string(),
        payment_id: payment_id.to_string(),
        item_id: item_id.to_string(),
        created_at: now,
    })
}

pub fn list_platform_fees_for_payment(
    conn: &Connection,
    payment_id: &str,
) -> Result<Vec<PlatformFee>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM platform_fees WHERE payment_id = ?1",
            PLATFORM_FEE_COLS
        ),
        &[&payment_id],
    )
}

pub fn create_earning(
    conn: &Connection,
    seller_id: &str,
    amount_cents: i64,
    payment_id: &str,
    item_id: &str,
) -> Result<Earning> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO earnings (id, seller_id, amount_cents, payment_id, item_id, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 'AVAILABLE', ?6, ?7)",
        params![&id, seller_id, amount_cents, payment_id, item_id, now, now],
    )?;

    Ok(Earning {
        id,
        seller_id: seller_id.to_string(),
        amount_cents,
        payment_id: payment_id.to_string(),
        item_id: item_id.to_string(),
        status: EarningStatus::Available,
        withdrawal_id: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn list_earnings_for_payment(conn: &Connection, payment_id: &str) -> Result<Vec<Earning>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM earnings WHERE payment_id = ?1",
            EARNING_COLS
        ),
        &[&payment_id],
    )
}

/// Earmark a seller's AVAILABLE earnings for a withdrawal, oldest first,
/// until they cover `amount_cents`. An earning straddling the boundary is
/// split: the covered portion is reserved and the remainder stays AVAILABLE
/// as a new row with the same payment provenance. The reserved rows sum to
/// exactly the withdrawal amount, so settlement never overstates what was
/// paid out. A balance larger than the earning ledger (re-credited funds)
/// simply leaves fewer rows reserved.
pub fn reserve_seller_earnings(
    conn: &Connection,
    seller_id: &str,
    withdrawal_id: &str,
    amount_cents: i64,
) -> Result<()> {
    let available: Vec<Earning> = query_all(
        conn,
        &format!(
            "SELECT {} FROM earnings
             WHERE seller_id = ?1 AND status = 'AVAILABLE'
             ORDER BY created_at ASC, id ASC",
            EARNING_COLS
        ),
        &[&seller_id],
    )?;

    let mut remaining = amount_cents;
    for earning in available {
        if remaining == 0 {
            break;
        }
        if earning.amount_cents <= remaining {
            conn.execute(
                "UPDATE earnings SET status = 'WITHDRAWAL_PENDING', withdrawal_id = ?1,
                        updated_at = ?2
                 WHERE id = ?3",
                params![withdrawal_id, now(), &earning.id],
            )?;
            remaining -= earning.amount_cents;
        } else {
            conn.execute(
                "UPDATE earnings SET amount_cents = ?1, status = 'WITHDRAWAL_PENDING',
                        withdrawal_id = ?2, updated_at = ?3
                 WHERE id = ?4",
                params![remaining, withdrawal_id, now(), &earning.id],
            )?;
            create_earning(
                conn,
                seller_id,
                earning.amount_cents - remaining,
                &earning.payment_id,
                &earning.item_id,
            )?;
            remaining = 0;
        }
    }
    Ok(())
}

/// Move the earnings linked to one withdrawal between statuses. The link is
/// cleared when they return to AVAILABLE, so a later withdrawal can reserve
/// them again.
pub fn transition_withdrawal_earnings(
    conn: &Connection,
    withdrawal_id: &str,
    from: EarningStatus,
    to: EarningStatus,
) -> Result<usize> {
    let affected = if to == EarningStatus::Available {
        conn.execute(
            "UPDATE earnings SET status = ?1, withdrawal_id = NULL, updated_at = ?2
             WHERE withdrawal_id = ?3 AND status = ?4",
            params![to.as_str(), now(), withdrawal_id, from.as_str()],
        )?
    } else {
        conn.execute(
            "UPDATE earnings SET status = ?1, updated_at = ?2
             WHERE withdrawal_id = ?3 AND status = ?4",
            params![to.as_str(), now(), withdrawal_id, from.as_str()],
        )?
    };
    Ok(affected)
}

// ============ Withdrawals ============

pub fn create_withdrawal(conn: &Connection, user_id: &str, amount_cents: i64) -> Result<Withdrawal> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO withdrawals (id, user_id, amount_cents, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, 'PENDING', ?4, ?5)",
        params![&id, user_id, amount_cents, now, now],
    )?;

    Ok(Withdrawal {
        id,
        user_id: user_id.to_string(),
        amount_cents,
        status: WithdrawalStatus::Pending,
        gateway_transfer_id: None,
        failure_reason: None,
        reversed_at: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_withdrawal_by_id(conn: &Connection, id: &str) -> Result<Option<Withdrawal>> {
    query_one(
        conn,
        &format!("SELECT {} FROM withdrawals WHERE id = ?1", WITHDRAWAL_COLS),
        &[&id],
    )
}

pub fn get_withdrawal_by_transfer_id(
    conn: &Connection,
    transfer_id: &str,
) -> Result<Option<Withdrawal>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM withdrawals WHERE gateway_transfer_id = ?1",
            WITHDRAWAL_COLS
        ),
        &[&transfer_id],
    )
}

pub fn mark_withdrawal_processing(conn: &Connection, id: &str, transfer_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE withdrawals SET status = 'PROCESSING', gateway_transfer_id = ?1, updated_at = ?2
         WHERE id = ?3",
        params![transfer_id, now(), id],
    )?;
    Ok(())
}

pub fn mark_withdrawal_completed(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(
        "UPDATE withdrawals SET status = 'COMPLETED', updated_at = ?1 WHERE id = ?2",
        params![now(), id],
    )?;
    Ok(())
}

pub fn mark_withdrawal_failed(conn: &Connection, id: &str, reason: &str) -> Result<()> {
    conn.execute(
        "UPDATE withdrawals SET status = 'FAILED', failure_reason = ?1, updated_at = ?2
         WHERE id = ?3",
        params![reason, now(), id],
    )?;
    Ok(())
}

/// Stamp a completed withdrawal as reversed. Returns false when the stamp
/// was already set, so the compensating credit is applied at most once.
pub fn try_mark_withdrawal_reversed(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE withdrawals SET status = 'FAILED', failure_reason = 'Transfer reversed by gateway',
                reversed_at = ?1, updated_at = ?1
         WHERE id = ?2 AND status = 'COMPLETED' AND reversed_at IS NULL",
        params![now(), id],
    )?;
    Ok(affected > 0)
}

// ============ Webhook event dedup ============

/// Claim a provider event id. Returns true for a fresh event, false for a
/// replay. Call inside the transaction that applies the event so the claim
/// rolls back with it and the gateway retry can succeed.
pub fn try_record_webhook_event(conn: &Connection, gateway: &str, event_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "INSERT OR IGNORE INTO webhook_events (gateway, event_id, received_at) VALUES (?1, ?2, ?3)",
        params![gateway, event_id, now()],
    )?;
    Ok(affected > 0)
}
