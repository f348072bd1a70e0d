//! payflow - Double-Entry Ledger with Outbox Payouts
//!
//! Idempotent fund transfers between ledger accounts, with payouts to the
//! external bank rail driven asynchronously from a transactional outbox.
//!
//! # Modules
//!
//! - [`config`] - YAML configuration with environment overrides
//! - [`logging`] - tracing subscriber setup
//! - [`db`] - PostgreSQL pool and schema bootstrap
//! - [`ledger`] - Accounts, entries and the reconciliation audit
//! - [`idempotency`] - Request-level key gate (Redis SET NX EX)
//! - [`transfer`] - Atomic transfer engine and service
//! - [`payout`] - Outbox task queue, payout providers and the worker
//! - [`gateway`] - HTTP surface

pub mod config;
pub mod db;
pub mod gateway;
pub mod idempotency;
pub mod ledger;
pub mod logging;
pub mod payout;
pub mod transfer;

// Convenient re-exports at crate root
pub use config::AppConfig;
pub use db::Database;
pub use idempotency::{Admission, IdempotencyGate};
pub use ledger::{Account, AccountId, Entry, LedgerAudit, LedgerRepository, MinorUnits, TransactionId};
pub use payout::{PayoutWorker, PgTaskQueue, TaskStatus, WorkerConfig};
pub use transfer::{TransferEngine, TransferError, TransferReceipt, TransferRequest, TransferService};
