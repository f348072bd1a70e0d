//! Ledger Repository
//!
//! Account provisioning and read access to accounts and entries.
//! Transfers never go through here; they are written by the transfer engine.

use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::types::{Account, AccountId, Entry, MinorUnits, TransactionId};

/// Counter-account for opening balances. Its balance is the negative of all
/// funds ever provisioned, which keeps the ledger zero-sum.
pub const EQUITY_ACCOUNT_ID: Uuid = Uuid::nil();
const EQUITY_ACCOUNT_OWNER: &str = "SYSTEM_EQUITY";

pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Provision an account with an opening balance.
    ///
    /// A non-zero opening balance is booked as a balanced entry pair against
    /// the equity account, so `balance == sum(entries)` holds from the start.
    pub async fn open_account(
        &self,
        owner: &str,
        opening_balance: MinorUnits,
    ) -> Result<Account, sqlx::Error> {
        let id = AccountId::new();
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO accounts (id, owner, balance) VALUES ($1, $2, $3)")
            .bind(id.inner())
            .bind(owner)
            .bind(opening_balance)
            .execute(&mut *tx)
            .await?;

        if opening_balance != 0 {
            sqlx::query(
                r#"
                INSERT INTO accounts (id, owner, balance) VALUES ($1, $2, 0)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(EQUITY_ACCOUNT_ID)
            .bind(EQUITY_ACCOUNT_OWNER)
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE accounts SET balance = balance - $1 WHERE id = $2")
                .bind(opening_balance)
                .bind(EQUITY_ACCOUNT_ID)
                .execute(&mut *tx)
                .await?;

            let opening_tx = TransactionId::new();
            for (account, amount) in [
                (EQUITY_ACCOUNT_ID, -opening_balance),
                (id.inner(), opening_balance),
            ] {
                sqlx::query(
                    "INSERT INTO entries (id, account_id, amount, transaction_id) VALUES ($1, $2, $3, $4)",
                )
                .bind(Uuid::new_v4())
                .bind(account)
                .bind(amount)
                .bind(opening_tx.inner())
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        tracing::info!(account_id = %id, owner, opening_balance, "Account opened");

        Ok(Account {
            id,
            owner: owner.to_string(),
            balance: opening_balance,
        })
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>, sqlx::Error> {
        let row = sqlx::query("SELECT id, owner, balance FROM accounts WHERE id = $1")
            .bind(id.inner())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| -> Result<Account, sqlx::Error> {
            Ok(Account {
                id: AccountId::from_uuid(row.try_get("id")?),
                owner: row.try_get("owner")?,
                balance: row.try_get("balance")?,
            })
        })
        .transpose()
    }

    /// Both legs of a transfer, debit first
    pub async fn entries_for_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Vec<Entry>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, amount, transaction_id
            FROM entries
            WHERE transaction_id = $1
            ORDER BY amount ASC
            "#,
        )
        .bind(transaction_id.inner())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_entry).collect()
    }

    pub async fn entries_for_account(&self, id: AccountId) -> Result<Vec<Entry>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, amount, transaction_id
            FROM entries
            WHERE account_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(id.inner())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_entry).collect()
    }
}

fn row_to_entry(row: &sqlx::postgres::PgRow) -> Result<Entry, sqlx::Error> {
    Ok(Entry {
        id: row.try_get("id")?,
        account_id: AccountId::from_uuid(row.try_get("account_id")?),
        amount: row.try_get("amount")?,
        transaction_id: TransactionId::from_uuid(row.try_get("transaction_id")?),
    })
}
