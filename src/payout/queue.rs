//! Payout Outbox Queue
//!
//! Tasks are inserted by the transfer engine inside its own transaction
//! (`enqueue`) and consumed by workers through a skip-locked claim.
//! All status updates are CAS on the current status.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Row};
use std::time::Duration;
use thiserror::Error;

use super::state::TaskStatus;
use super::types::{ClaimedTask, PayoutDestination, PayoutTask, TaskId};
use crate::ledger::{AccountId, TransactionId};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt task row: {0}")]
    Corrupt(String),
}

/// Work-queue operations used by the payout worker
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Atomically move one eligible PENDING task to PROCESSING.
    ///
    /// Rows locked by a concurrent claimant are skipped, never waited on.
    /// The claim is committed before returning, so no lock is held while the
    /// caller talks to the provider.
    async fn claim_next(&self) -> Result<Option<ClaimedTask>, QueueError>;

    /// PROCESSING → COMPLETED. Returns false if the task was not PROCESSING.
    async fn complete(&self, task_id: TaskId) -> Result<bool, QueueError>;

    /// PROCESSING → FAILED with `error` recorded. Returns false if the task was not PROCESSING.
    async fn fail(&self, task_id: TaskId, error: &str) -> Result<bool, QueueError>;

    /// Move PROCESSING tasks untouched for longer than `threshold` back to PENDING.
    async fn reclaim_stale(&self, threshold: Duration) -> Result<u64, QueueError>;
}

/// Insert a PENDING task for `transaction_id`.
///
/// Takes a connection rather than the pool so it can only run inside the
/// caller's transaction: the task exists if and only if that transaction commits.
pub async fn enqueue(
    conn: &mut PgConnection,
    transaction_id: TransactionId,
) -> Result<TaskId, sqlx::Error> {
    let task_id = TaskId::new();
    sqlx::query(
        r#"
        INSERT INTO payout_tasks (id, transaction_id, status, created_at, updated_at)
        VALUES ($1, $2, $3, NOW(), NOW())
        "#,
    )
    .bind(task_id.inner())
    .bind(transaction_id.inner())
    .bind(TaskStatus::Pending.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(task_id)
}

/// PostgreSQL-backed task queue
pub struct PgTaskQueue {
    pool: PgPool,
}

impl PgTaskQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, task_id: TaskId) -> Result<Option<PayoutTask>, QueueError> {
        let row = sqlx::query(
            r#"
            SELECT id, transaction_id, status, last_error, created_at, updated_at
            FROM payout_tasks WHERE id = $1
            "#,
        )
        .bind(task_id.inner())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_task(&r)).transpose()
    }

    pub async fn find_by_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<PayoutTask>, QueueError> {
        let row = sqlx::query(
            r#"
            SELECT id, transaction_id, status, last_error, created_at, updated_at
            FROM payout_tasks WHERE transaction_id = $1
            "#,
        )
        .bind(transaction_id.inner())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_task(&r)).transpose()
    }

    async fn transition(
        &self,
        task_id: TaskId,
        expected: TaskStatus,
        next: TaskStatus,
        error: Option<&str>,
    ) -> Result<bool, QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE payout_tasks
            SET status = $1, last_error = COALESCE($2, last_error), updated_at = NOW()
            WHERE id = $3 AND status = $4
            "#,
        )
        .bind(next.as_str())
        .bind(error)
        .bind(task_id.inner())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TaskQueue for PgTaskQueue {
    async fn claim_next(&self) -> Result<Option<ClaimedTask>, QueueError> {
        let row = sqlx::query(
            r#"
            UPDATE payout_tasks AS t
            SET status = $1, updated_at = NOW()
            FROM (
                SELECT pt.id, e.amount, e.account_id, a.owner
                FROM payout_tasks pt
                JOIN entries e ON e.transaction_id = pt.transaction_id AND e.amount > 0
                JOIN accounts a ON a.id = e.account_id
                WHERE pt.status = $2
                LIMIT 1
                FOR UPDATE OF pt SKIP LOCKED
            ) AS claimed
            WHERE t.id = claimed.id
            RETURNING t.id, t.transaction_id, claimed.amount, claimed.account_id, claimed.owner
            "#,
        )
        .bind(TaskStatus::Processing.as_str())
        .bind(TaskStatus::Pending.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(ClaimedTask {
            task_id: TaskId::from_uuid(row.try_get("id")?),
            transaction_id: TransactionId::from_uuid(row.try_get("transaction_id")?),
            amount: row.try_get("amount")?,
            destination: PayoutDestination {
                account_id: AccountId::from_uuid(row.try_get("account_id")?),
                owner: row.try_get("owner")?,
            },
        }))
    }

    async fn complete(&self, task_id: TaskId) -> Result<bool, QueueError> {
        self.transition(task_id, TaskStatus::Processing, TaskStatus::Completed, None)
            .await
    }

    async fn fail(&self, task_id: TaskId, error: &str) -> Result<bool, QueueError> {
        self.transition(
            task_id,
            TaskStatus::Processing,
            TaskStatus::Failed,
            Some(error),
        )
        .await
    }

    async fn reclaim_stale(&self, threshold: Duration) -> Result<u64, QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE payout_tasks
            SET status = $1, updated_at = NOW()
            WHERE status = $2
              AND updated_at < NOW() - INTERVAL '1 millisecond' * $3
            "#,
        )
        .bind(TaskStatus::Pending.as_str())
        .bind(TaskStatus::Processing.as_str())
        .bind(threshold.as_millis() as i64)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

fn row_to_task(row: &sqlx::postgres::PgRow) -> Result<PayoutTask, QueueError> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<TaskStatus>()
        .map_err(|e| QueueError::Corrupt(e.to_string()))?;

    Ok(PayoutTask {
        id: TaskId::from_uuid(row.try_get("id")?),
        transaction_id: TransactionId::from_uuid(row.try_get("transaction_id")?),
        status,
        last_error: row.try_get("last_error")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
