//! Ledger and outbox schema
//!
//! Every statement is idempotent so `init_schema` can run on each startup.

use sqlx::PgPool;

const CREATE_ACCOUNTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id          UUID PRIMARY KEY,
    owner       TEXT NOT NULL,
    balance     BIGINT NOT NULL DEFAULT 0,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_ENTRIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    id              UUID PRIMARY KEY,
    account_id      UUID NOT NULL REFERENCES accounts (id),
    amount          BIGINT NOT NULL CHECK (amount <> 0),
    transaction_id  UUID NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_ENTRIES_TX_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_entries_transaction_id ON entries (transaction_id)";

const CREATE_ENTRIES_ACCOUNT_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_entries_account_id ON entries (account_id)";

const CREATE_PAYOUT_TASKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS payout_tasks (
    id              UUID PRIMARY KEY,
    transaction_id  UUID NOT NULL UNIQUE,
    status          TEXT NOT NULL
                    CHECK (status IN ('PENDING', 'PROCESSING', 'COMPLETED', 'FAILED')),
    last_error      TEXT,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_PAYOUT_STATUS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_payout_tasks_status ON payout_tasks (status)";

/// Create tables and indexes if they do not exist yet
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Initializing ledger schema...");

    for statement in [
        CREATE_ACCOUNTS_TABLE,
        CREATE_ENTRIES_TABLE,
        CREATE_ENTRIES_TX_INDEX,
        CREATE_ENTRIES_ACCOUNT_INDEX,
        CREATE_PAYOUT_TASKS_TABLE,
        CREATE_PAYOUT_STATUS_INDEX,
    ] {
        sqlx::query(statement).execute(pool).await?;
    }

    tracing::info!("Ledger schema initialized successfully");
    Ok(())
}
