//! Reconciliation audit
//!
//! Read-only checks of the two ledger invariants:
//! - the sum of all entries is zero
//! - every account balance equals the sum of its entries

use serde::Serialize;
use sqlx::{PgPool, Row};

use super::types::{AccountId, MinorUnits};

/// Account whose denormalized balance disagrees with its entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceMismatch {
    pub account_id: AccountId,
    pub balance: MinorUnits,
    pub entry_sum: MinorUnits,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub global_sum: MinorUnits,
    pub mismatches: Vec<BalanceMismatch>,
    /// Zero-sum holds and no account has drifted
    pub passed: bool,
}

impl AuditReport {
    pub fn new(global_sum: MinorUnits, mismatches: Vec<BalanceMismatch>) -> Self {
        let passed = global_sum == 0 && mismatches.is_empty();
        Self {
            global_sum,
            mismatches,
            passed,
        }
    }

    /// Mismatch for `account_id`, if its balance has drifted
    pub fn mismatch_for(&self, account_id: AccountId) -> Option<&BalanceMismatch> {
        self.mismatches.iter().find(|m| m.account_id == account_id)
    }
}

pub struct LedgerAudit {
    pool: PgPool,
}

impl LedgerAudit {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Sum of every entry in the ledger. Anything but zero means corruption.
    pub async fn global_entry_sum(&self) -> Result<MinorUnits, sqlx::Error> {
        // SUM(BIGINT) is NUMERIC in Postgres
        sqlx::query_scalar::<_, i64>("SELECT COALESCE(SUM(amount), 0)::BIGINT FROM entries")
            .fetch_one(&self.pool)
            .await
    }

    pub async fn account_mismatches(&self) -> Result<Vec<BalanceMismatch>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.balance, COALESCE(SUM(e.amount), 0)::BIGINT AS entry_sum
            FROM accounts a
            LEFT JOIN entries e ON a.id = e.account_id
            GROUP BY a.id, a.balance
            HAVING a.balance <> COALESCE(SUM(e.amount), 0)
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<BalanceMismatch, sqlx::Error> {
                Ok(BalanceMismatch {
                    account_id: AccountId::from_uuid(row.try_get("id")?),
                    balance: row.try_get("balance")?,
                    entry_sum: row.try_get("entry_sum")?,
                })
            })
            .collect()
    }

    pub async fn run(&self) -> Result<AuditReport, sqlx::Error> {
        let global_sum = self.global_entry_sum().await?;
        let mismatches = self.account_mismatches().await?;

        for m in &mismatches {
            tracing::error!(
                account_id = %m.account_id,
                balance = m.balance,
                entry_sum = m.entry_sum,
                "Ledger mismatch: balance differs from entry sum"
            );
        }

        let report = AuditReport::new(global_sum, mismatches);
        if report.passed {
            tracing::info!("Ledger audit passed");
        } else {
            tracing::error!(
                global_sum = report.global_sum,
                mismatches = report.mismatches.len(),
                "Ledger audit FAILED"
            );
        }
        Ok(report)
    }
}
