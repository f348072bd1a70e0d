//! Payouts
//!
//! Consumer side of the transfer outbox. Each committed transfer leaves one
//! `payout_tasks` row; the worker claims rows with `FOR UPDATE SKIP LOCKED`,
//! calls the payout provider and records the outcome. Provider failures never
//! touch the ledger.
//!
//! # State Machine
//!
//! ```text
//! PENDING → PROCESSING → COMPLETED
//!                ↓
//!              FAILED
//! ```

pub mod provider;
pub mod queue;
pub mod state;
pub mod types;
pub mod worker;

#[cfg(test)]
mod integration_tests;

pub use provider::{
    FailingPayoutProvider, HttpPayoutProvider, MockPayoutProvider, PayoutProvider, ProviderError,
    ProviderErrorKind,
};
pub use queue::{PgTaskQueue, QueueError, TaskQueue};
pub use state::TaskStatus;
pub use types::{ClaimedTask, PayoutDestination, PayoutTask, TaskId};
pub use worker::{PayoutWorker, TickOutcome, WorkerConfig};
