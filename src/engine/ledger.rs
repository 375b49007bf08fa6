//! Ledger accounting primitives.
//!
//! Balance, stock, and fee-total mutations plus the append-only Earning
//! and PlatformFee records. Callers own the transaction; every function
//! here takes the open transaction's connection.

use rusqlite::Connection;

use crate::db::queries;
use crate::error::{msg, AppError, Result};
use crate::fees::FeeQuote;
use crate::models::{Earning, ItemStatus, Payment, PlatformFee};

/// Apply the accounting side of a release: the sale becomes final, the
/// seller is credited net, ledger entries are written, and the platform
/// total is incremented. The unit itself already left the shelf when the
/// payment entered escrow.
pub fn apply_release(
    conn: &Connection,
    payment: &Payment,
    quote: &FeeQuote,
) -> Result<(Earning, PlatformFee)> {
    let item = queries::get_item_by_id(conn, &payment.item_id)?
        .ok_or_else(|| AppError::NotFound(msg::ITEM_NOT_FOUND.into()))?;
    let status = if item.quantity == 0 {
        ItemStatus::Sold
    } else {
        ItemStatus::Available
    };
    queries::set_item_status(conn, &payment.item_id, status)?;

    queries::credit_balance(conn, &payment.seller_id, quote.net_cents)?;

    let earning = queries::create_earning(
        conn,
        &payment.seller_id,
        quote.net_cents,
        &payment.id,
        &payment.item_id,
    )?;
    let fee = queries::create_platform_fee(
        conn,
        quote.fee_cents,
        quote.applied_bps,
        quote.applied_rule_id.as_deref(),
        &payment.seller_id,
        &payment.id,
        &payment.item_id,
    )?;
    queries::add_platform_fees(conn, quote.fee_cents)?;

    Ok((earning, fee))
}

/// Apply the accounting side of a refund: the unit goes back on the shelf
/// and the buyer gets the full original amount, not amount-minus-fee.
pub fn apply_refund(conn: &Connection, payment: &Payment) -> Result<()> {
    queries::restock_item_unit(conn, &payment.item_id)?;
    queries::credit_balance(conn, &payment.buyer_id, payment.amount_cents)
}
