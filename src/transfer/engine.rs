//! Transfer Engine
//!
//! Moves funds between two accounts in one PostgreSQL transaction: balance
//! check, both ledger entries, both balance updates and the payout outbox row
//! commit together or not at all.

use std::collections::HashMap;

use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use super::error::TransferError;
use super::types::{TransferReceipt, validate_amount};
use crate::ledger::{AccountId, MinorUnits, TransactionId};
use crate::payout::queue;

pub struct TransferEngine {
    pool: PgPool,
}

impl TransferEngine {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Execute an atomic transfer of `amount` from `from` to `to`.
    ///
    /// Account rows are locked in id order, so opposing concurrent transfers
    /// between the same pair cannot deadlock. A transfer to the same account
    /// is allowed and leaves its balance unchanged.
    pub async fn execute_transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: MinorUnits,
    ) -> Result<TransferReceipt, TransferError> {
        validate_amount(amount)?;

        let mut tx = self.pool.begin().await?;

        let mut ids = vec![from.inner(), to.inner()];
        ids.sort();
        ids.dedup();

        let rows = sqlx::query(
            "SELECT id, balance FROM accounts WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;

        let mut balances: HashMap<Uuid, MinorUnits> = HashMap::with_capacity(rows.len());
        for row in &rows {
            balances.insert(row.try_get("id")?, row.try_get("balance")?);
        }

        let available = *balances
            .get(&from.inner())
            .ok_or(TransferError::AccountNotFound(from))?;
        if !balances.contains_key(&to.inner()) {
            return Err(TransferError::AccountNotFound(to));
        }

        if available < amount {
            debug!(
                from = %from,
                available,
                requested = amount,
                "Transfer rejected: insufficient funds"
            );
            return Err(TransferError::InsufficientFunds {
                available,
                requested: amount,
            });
        }

        let transaction_id = TransactionId::new();

        for (account, delta) in [(from, -amount), (to, amount)] {
            sqlx::query(
                "INSERT INTO entries (id, account_id, amount, transaction_id) VALUES ($1, $2, $3, $4)",
            )
            .bind(Uuid::new_v4())
            .bind(account.inner())
            .bind(delta)
            .bind(transaction_id.inner())
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE accounts SET balance = balance + $1 WHERE id = $2")
                .bind(delta)
                .bind(account.inner())
                .execute(&mut *tx)
                .await?;
        }

        let task_id = queue::enqueue(&mut *tx, transaction_id).await?;

        tx.commit().await?;

        info!(
            transaction_id = %transaction_id,
            task_id = %task_id,
            from = %from,
            to = %to,
            amount,
            "Transfer committed"
        );

        Ok(TransferReceipt {
            transaction_id,
            task_id,
            from_account_id: from,
            to_account_id: to,
            amount,
        })
    }
}
