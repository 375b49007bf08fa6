//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to
/// rusqlite errors instead of panicking on corrupt data.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const USER_COLS: &str =
    "id, name, role, api_key_hash, available_balance_cents, created_at, updated_at";

pub const ITEM_COLS: &str =
    "id, seller_id, title, price_cents, quantity, status, created_at, updated_at";

pub const PAYMENT_COLS: &str = "id, item_id, buyer_id, seller_id, amount_cents, currency, status, gateway, gateway_transaction_id, platform_fee_charged_cents, active_dispute_id, failure_reason, created_at, updated_at";

pub const DISPUTE_COLS: &str = "id, payment_id, item_id, filed_by_user_id, other_party_user_id, reason, description, status, resolution_notes, resolved_at, created_at";

pub const FEE_RULE_COLS: &str =
    "id, min_amount_cents, max_amount_cents, fee_bps, is_active, priority, created_at";

pub const PLATFORM_SETTINGS_COLS: &str =
    "id, default_fee_bps, total_platform_fees_cents, updated_at";

pub const PLATFORM_FEE_COLS: &str = "id, amount_cents, applied_fee_bps, applied_fee_rule_id, seller_id, payment_id, item_id, created_at";

pub const EARNING_COLS: &str =
    "id, seller_id, amount_cents, payment_id, item_id, status, withdrawal_id, created_at, updated_at";

pub const WITHDRAWAL_COLS: &str = "id, user_id, amount_cents, status, gateway_transfer_id, failure_reason, reversed_at, created_at, updated_at";

// ============ FromRow Implementations ============

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            role: parse_enum(row, 2, "role")?,
            api_key_hash: row.get(3)?,
            available_balance_cents: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

impl FromRow for Item {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Item {
            id: row.get(0)?,
            seller_id: row.get(1)?,
            title: row.get(2)?,
            price_cents: row.get(3)?,
            quantity: row.get(4)?,
            status: parse_enum(row, 5, "status")?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

impl FromRow for Payment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Payment {
            id: row.get(0)?,
            item_id: row.get(1)?,
            buyer_id: row.get(2)?,
            seller_id: row.get(3)?,
            amount_cents: row.get(4)?,
            currency: row.get(5)?,
            status: parse_enum(row, 6, "status")?,
            gateway: row.get(7)?,
            gateway_transaction_id: row.get(8)?,
            platform_fee_charged_cents: row.get(9)?,
            active_dispute_id: row.get(10)?,
            failure_reason: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }
}

impl FromRow for Dispute {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Dispute {
            id: row.get(0)?,
            payment_id: row.get(1)?,
            item_id: row.get(2)?,
            filed_by_user_id: row.get(3)?,
            other_party_user_id: row.get(4)?,
            reason: row.get(5)?,
            description: row.get(6)?,
            status: parse_enum(row, 7, "status")?,
            resolution_notes: row.get(8)?,
            resolved_at: row.get(9)?,
            created_at: row.get(10)?,
        })
    }
}

impl FromRow for FeeRule {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(FeeRule {
            id: row.get(0)?,
            min_amount_cents: row.get(1)?,
            max_amount_cents: row.get(2)?,
            fee_bps: row.get(3)?,
            is_active: row.get(4)?,
            priority: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

impl FromRow for PlatformSettings {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(PlatformSettings {
            id: row.get(0)?,
            default_fee_bps: row.get(1)?,
            total_platform_fees_cents: row.get(2)?,
            updated_at: row.get(3)?,
        })
    }
}

impl FromRow for PlatformFee {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(PlatformFee {
            id: row.get(0)?,
            amount_cents: row.get(1)?,
            applied_fee_bps: row.get(2)?,
            applied_fee_rule_id: row.get(3)?,
            seller_id: row.get(4)?,
            payment_id: row.get(5)?,
            item_id: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

impl FromRow for Earning {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Earning {
            id: row.get(0)?,
            seller_id: row.get(1)?,
            amount_cents: row.get(2)?,
            payment_id: row.get(3)?,
            item_id: row.get(4)?,
            status: parse_enum(row, 5, "status")?,
            withdrawal_id: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

impl FromRow for Withdrawal {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Withdrawal {
            id: row.get(0)?,
            user_id: row.get(1)?,
            amount_cents: row.get(2)?,
            status: parse_enum(row, 3, "status")?,
            gateway_transfer_id: row.get(4)?,
            failure_reason: row.get(5)?,
            reversed_at: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}
