use rusqlite::Connection;

/// Initialize the database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Accounts. Balances are in integer cents and change only inside
        -- payment/withdrawal transactions.
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('buyer', 'seller', 'admin')),
            api_key_hash TEXT NOT NULL UNIQUE,
            available_balance_cents INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_users_api_key ON users(api_key_hash);

        -- Marketplace listings.
        CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            seller_id TEXT NOT NULL REFERENCES users(id),
            title TEXT NOT NULL,
            price_cents INTEGER NOT NULL,
            quantity INTEGER NOT NULL CHECK (quantity >= 0),
            status TEXT NOT NULL CHECK (status IN
                ('AVAILABLE', 'PAID_ESCROW', 'SOLD', 'DISPUTED', 'DELISTED')),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_items_seller ON items(seller_id);

        -- One payment per purchase attempt. active_dispute_id is non-null
        -- iff status = 'DISPUTED'.
        CREATE TABLE IF NOT EXISTS payments (
            id TEXT PRIMARY KEY,
            item_id TEXT NOT NULL REFERENCES items(id),
            buyer_id TEXT NOT NULL REFERENCES users(id),
            seller_id TEXT NOT NULL REFERENCES users(id),
            amount_cents INTEGER NOT NULL,
            currency TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN
                ('INITIATED', 'SUCCESSFUL_ESCROW', 'PENDING_CONFIRMATION',
                 'DISPUTED', 'RELEASED_TO_SELLER', 'REFUNDED_TO_BUYER',
                 'FAILED', 'CANCELLED')),
            gateway TEXT NOT NULL,
            gateway_transaction_id TEXT,
            platform_fee_charged_cents INTEGER,
            active_dispute_id TEXT,
            failure_reason TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_payments_item ON payments(item_id);
        CREATE INDEX IF NOT EXISTS idx_payments_buyer ON payments(buyer_id);
        CREATE INDEX IF NOT EXISTS idx_payments_seller ON payments(seller_id);

        -- Disputes. The partial unique index enforces at most one open
        -- dispute per payment.
        CREATE TABLE IF NOT EXISTS disputes (
            id TEXT PRIMARY KEY,
            payment_id TEXT NOT NULL REFERENCES payments(id),
            item_id TEXT NOT NULL REFERENCES items(id),
            filed_by_user_id TEXT NOT NULL REFERENCES users(id),
            other_party_user_id TEXT NOT NULL REFERENCES users(id),
            reason TEXT NOT NULL,
            description TEXT,
            status TEXT NOT NULL CHECK (status IN
                ('PENDING_ADMIN', 'RESOLVED_REFUND',
                 'RESOLVED_RELEASE_PAYMENT', 'CLOSED')),
            resolution_notes TEXT,
            resolved_at INTEGER,
            created_at INTEGER NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_disputes_open_payment
            ON disputes(payment_id) WHERE status = 'PENDING_ADMIN';

        -- Tiered fee rules, consumed (not owned) by this service.
        CREATE TABLE IF NOT EXISTS fee_rules (
            id TEXT PRIMARY KEY,
            min_amount_cents INTEGER NOT NULL,
            max_amount_cents INTEGER,
            fee_bps INTEGER NOT NULL CHECK (fee_bps BETWEEN 0 AND 10000),
            is_active INTEGER NOT NULL DEFAULT 1,
            priority INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            CHECK (max_amount_cents IS NULL OR min_amount_cents <= max_amount_cents)
        );

        -- Singleton platform record (id = 'platform'). The running fee
        -- total is only ever mutated via UPDATE ... SET total = total + ?.
        CREATE TABLE IF NOT EXISTS platform_settings (
            id TEXT PRIMARY KEY,
            default_fee_bps INTEGER NOT NULL CHECK (default_fee_bps BETWEEN 0 AND 10000),
            total_platform_fees_cents INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL
        );

        -- Append-only fee ledger. Rows are never updated or deleted.
        CREATE TABLE IF NOT EXISTS platform_fees (
            id TEXT PRIMARY KEY,
            amount_cents INTEGER NOT NULL,
            applied_fee_bps INTEGER NOT NULL,
            applied_fee_rule_id TEXT,
            seller_id TEXT NOT NULL REFERENCES users(id),
            payment_id TEXT NOT NULL REFERENCES payments(id),
            item_id TEXT NOT NULL REFERENCES items(id),
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_platform_fees_payment ON platform_fees(payment_id);

        -- Seller net credit records, created at release. withdrawal_id is
        -- set while an earning is reserved by (or settled through) a
        -- withdrawal, so settlement touches only the covering earnings.
        CREATE TABLE IF NOT EXISTS earnings (
            id TEXT PRIMARY KEY,
            seller_id TEXT NOT NULL REFERENCES users(id),
            amount_cents INTEGER NOT NULL,
            payment_id TEXT NOT NULL REFERENCES payments(id),
            item_id TEXT NOT NULL REFERENCES items(id),
            status TEXT NOT NULL CHECK (status IN
                ('AVAILABLE', 'WITHDRAWAL_PENDING', 'WITHDRAWN')),
            withdrawal_id TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_earnings_seller ON earnings(seller_id);
        CREATE INDEX IF NOT EXISTS idx_earnings_withdrawal ON earnings(withdrawal_id);

        -- Payout requests. reversed_at guards the compensating credit for
        -- a reversed transfer against webhook replays.
        CREATE TABLE IF NOT EXISTS withdrawals (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
            status TEXT NOT NULL CHECK (status IN
                ('PENDING', 'PROCESSING', 'COMPLETED', 'FAILED')),
            gateway_transfer_id TEXT,
            failure_reason TEXT,
            reversed_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_withdrawals_user ON withdrawals(user_id);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_withdrawals_transfer
            ON withdrawals(gateway_transfer_id) WHERE gateway_transfer_id IS NOT NULL;

        -- Processed provider event ids; gateways retry delivery, so every
        -- financially consequential event is claimed here inside the same
        -- transaction that applies it.
        CREATE TABLE IF NOT EXISTS webhook_events (
            gateway TEXT NOT NULL,
            event_id TEXT NOT NULL,
            received_at INTEGER NOT NULL,
            PRIMARY KEY (gateway, event_id)
        );
        "#,
    )
}
