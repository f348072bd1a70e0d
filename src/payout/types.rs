//! Payout task types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::state::TaskStatus;
use crate::ledger::{AccountId, MinorUnits, TransactionId};

/// Payout task (outbox row) identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outbox row as stored
#[derive(Debug, Clone, Serialize)]
pub struct PayoutTask {
    pub id: TaskId,
    pub transaction_id: TransactionId,
    #[serde(serialize_with = "serialize_status")]
    pub status: TaskStatus,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Last status change; drives stale reclaim
    pub updated_at: DateTime<Utc>,
}

fn serialize_status<S: serde::Serializer>(status: &TaskStatus, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(status.as_str())
}

/// Where a payout goes: the credited account and its metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayoutDestination {
    pub account_id: AccountId,
    pub owner: String,
}

impl fmt::Display for PayoutDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.account_id, self.owner)
    }
}

/// A task a worker has moved to PROCESSING, joined with its credit leg
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedTask {
    pub task_id: TaskId,
    pub transaction_id: TransactionId,
    pub amount: MinorUnits,
    pub destination: PayoutDestination,
}
