//! Initial database migration.
//!
//! Creates the ledger, settlement, order, subscription and FX rate tables
//! together with the triggers that keep the ledger append-only and balanced.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ORDERS & SUBSCRIPTIONS
        // ============================================================
        db.execute_unprepared(ORDERS_SQL).await?;
        db.execute_unprepared(SUBSCRIPTIONS_SQL).await?;

        // ============================================================
        // PART 2: LEDGER
        // ============================================================
        db.execute_unprepared(TRANSACTIONS_SQL).await?;
        db.execute_unprepared(TRANSACTION_SETTLEMENTS_SQL).await?;

        // ============================================================
        // PART 3: CURRENCY
        // ============================================================
        db.execute_unprepared(FX_RATES_SQL).await?;

        // ============================================================
        // PART 4: TRIGGERS & FUNCTIONS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ORDERS_SQL: &str = r"
CREATE TABLE orders (
    id UUID PRIMARY KEY,
    contributor_account_id UUID NOT NULL,
    collective_account_id UUID NOT NULL,
    host_account_id UUID NOT NULL,
    host_currency CHAR(3) NOT NULL,
    host_country VARCHAR(2),
    host_fee_percent NUMERIC(7, 4),
    total_amount BIGINT NOT NULL,
    currency CHAR(3) NOT NULL,
    platform_tip BIGINT NOT NULL DEFAULT 0,
    expected_amount BIGINT,
    tax JSONB,
    tier_host_fee_percent NUMERIC(7, 4),
    payment_method JSONB,
    status VARCHAR(16) NOT NULL DEFAULT 'NEW',
    subscription_id UUID,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_orders_total_positive CHECK (total_amount > 0),
    CONSTRAINT chk_orders_tip_range CHECK (platform_tip >= 0 AND platform_tip <= total_amount),
    CONSTRAINT chk_orders_status CHECK (status IN (
        'NEW', 'PENDING', 'ACTIVE', 'ERROR', 'PAID', 'CANCELLED', 'EXPIRED', 'REFUNDED'
    ))
);

CREATE INDEX idx_orders_collective ON orders(collective_account_id, created_at DESC);
CREATE INDEX idx_orders_contributor ON orders(contributor_account_id, created_at DESC);
";

const SUBSCRIPTIONS_SQL: &str = r"
CREATE TABLE subscriptions (
    id UUID PRIMARY KEY,
    order_id UUID NOT NULL UNIQUE REFERENCES orders(id) ON DELETE CASCADE,
    amount BIGINT NOT NULL,
    currency CHAR(3) NOT NULL,
    billing_interval VARCHAR(5) NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    activated_at TIMESTAMPTZ,
    next_charge_date TIMESTAMPTZ,
    next_period_start TIMESTAMPTZ,
    charge_number INTEGER NOT NULL DEFAULT 0,
    charge_retry_count INTEGER NOT NULL DEFAULT 0,
    quantity INTEGER,
    deactivated_at TIMESTAMPTZ,
    claim_token UUID,
    claim_expires_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_subscriptions_amount_positive CHECK (amount > 0),
    CONSTRAINT chk_subscriptions_interval CHECK (billing_interval IN ('month', 'year')),
    CONSTRAINT chk_subscriptions_counts CHECK (charge_number >= 0 AND charge_retry_count >= 0),
    CONSTRAINT chk_subscriptions_claim CHECK ((claim_token IS NULL) = (claim_expires_at IS NULL))
);

-- Sweep lookup: active subscriptions by due date
CREATE INDEX idx_subscriptions_due ON subscriptions(next_charge_date) WHERE is_active;
";

const TRANSACTIONS_SQL: &str = r"
CREATE TABLE transactions (
    id UUID PRIMARY KEY,
    transaction_group UUID NOT NULL,
    entry_type VARCHAR(6) NOT NULL,
    kind VARCHAR(32) NOT NULL,
    amount BIGINT NOT NULL,
    currency CHAR(3) NOT NULL,
    amount_in_host_currency BIGINT NOT NULL,
    host_currency CHAR(3) NOT NULL,
    host_currency_fx_rate NUMERIC(19, 10) NOT NULL,
    net_amount_in_collective_currency BIGINT NOT NULL,
    tax_amount BIGINT NOT NULL DEFAULT 0,
    from_account_id UUID NOT NULL,
    to_account_id UUID NOT NULL,
    host_account_id UUID NOT NULL,
    order_id UUID,
    expense_id UUID,
    is_refund BOOLEAN NOT NULL DEFAULT FALSE,
    is_debt BOOLEAN NOT NULL DEFAULT FALSE,
    refund_transaction_id UUID REFERENCES transactions(id),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    cleared_at TIMESTAMPTZ,
    data JSONB NOT NULL DEFAULT '{}'::jsonb,
    CONSTRAINT chk_transactions_entry_type CHECK (entry_type IN ('CREDIT', 'DEBIT')),
    CONSTRAINT chk_transactions_linkage CHECK ((order_id IS NULL) <> (expense_id IS NULL)),
    CONSTRAINT chk_transactions_rate_positive CHECK (host_currency_fx_rate > 0),
    CONSTRAINT chk_transactions_refund_ref CHECK (refund_transaction_id IS NULL OR is_refund)
);

-- A leg is reversed at most once
CREATE UNIQUE INDEX uq_transactions_refund_transaction_id
    ON transactions(refund_transaction_id) WHERE refund_transaction_id IS NOT NULL;

CREATE INDEX idx_transactions_group ON transactions(transaction_group);
CREATE INDEX idx_transactions_order ON transactions(order_id) WHERE order_id IS NOT NULL;
CREATE INDEX idx_transactions_expense ON transactions(expense_id) WHERE expense_id IS NOT NULL;
CREATE INDEX idx_transactions_account ON transactions(to_account_id, created_at DESC, id DESC);
";

const TRANSACTION_SETTLEMENTS_SQL: &str = r"
CREATE TABLE transaction_settlements (
    id UUID PRIMARY KEY,
    transaction_group UUID NOT NULL,
    kind VARCHAR(32) NOT NULL,
    host_account_id UUID NOT NULL,
    status VARCHAR(10) NOT NULL DEFAULT 'OWED',
    expense_id UUID,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_settlements_status CHECK (status IN ('OWED', 'INVOICED', 'SETTLED')),
    CONSTRAINT uq_settlements_group_kind UNIQUE (transaction_group, kind)
);

CREATE INDEX idx_settlements_host_status ON transaction_settlements(host_account_id, status);
";

const FX_RATES_SQL: &str = r"
CREATE TABLE fx_rates (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    from_currency CHAR(3) NOT NULL,
    to_currency CHAR(3) NOT NULL,
    rate NUMERIC(19, 10) NOT NULL,
    effective_date DATE NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_fx_rate_positive CHECK (rate > 0),
    CONSTRAINT chk_fx_different_currencies CHECK (from_currency <> to_currency),
    CONSTRAINT uq_fx_rates_pair_date UNIQUE (from_currency, to_currency, effective_date)
);

CREATE INDEX idx_fx_rates_lookup ON fx_rates(from_currency, to_currency, effective_date DESC);
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: check_pair_balance
-- Every (group, kind, refund flag) nets to zero once the commit ends
-- ============================================================
CREATE OR REPLACE FUNCTION check_pair_balance()
RETURNS TRIGGER AS $$
DECLARE
    total BIGINT;
    total_host BIGINT;
BEGIN
    SELECT COALESCE(SUM(amount), 0), COALESCE(SUM(amount_in_host_currency), 0)
    INTO total, total_host
    FROM transactions
    WHERE transaction_group = NEW.transaction_group
      AND kind = NEW.kind
      AND is_refund = NEW.is_refund;

    IF total <> 0 OR total_host <> 0 THEN
        RAISE EXCEPTION 'Unbalanced % pair in group %: amount %, host amount %',
            NEW.kind, NEW.transaction_group, total, total_host;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE CONSTRAINT TRIGGER trg_check_pair_balance
AFTER INSERT ON transactions
DEFERRABLE INITIALLY DEFERRED
FOR EACH ROW
EXECUTE FUNCTION check_pair_balance();

-- ============================================================
-- FUNCTION: prevent_transaction_modification
-- Legs are immutable; corrections are written as refunds
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_transaction_modification()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'Transactions are append-only. Create a refund instead.';
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_transaction_mod
BEFORE UPDATE OR DELETE ON transactions
FOR EACH ROW
EXECUTE FUNCTION prevent_transaction_modification();
";

const DROP_ALL_SQL: &str = r"
-- Drop triggers
DROP TRIGGER IF EXISTS trg_prevent_transaction_mod ON transactions;
DROP TRIGGER IF EXISTS trg_check_pair_balance ON transactions;

-- Drop functions
DROP FUNCTION IF EXISTS prevent_transaction_modification();
DROP FUNCTION IF EXISTS check_pair_balance();

-- Drop tables (reverse order of creation)
DROP TABLE IF EXISTS fx_rates CASCADE;
DROP TABLE IF EXISTS transaction_settlements CASCADE;
DROP TABLE IF EXISTS transactions CASCADE;
DROP TABLE IF EXISTS subscriptions CASCADE;
DROP TABLE IF EXISTS orders CASCADE;
";
