//! Double-entry ledger
//!
//! Accounts carry a denormalized balance; entries are immutable and every
//! transaction's entries sum to zero. Writes happen only in the transfer
//! engine (and in account provisioning); this module owns the types, the
//! read side and the reconciliation audit.

pub mod audit;
pub mod repository;
pub mod types;

pub use audit::{AuditReport, BalanceMismatch, LedgerAudit};
pub use repository::{EQUITY_ACCOUNT_ID, LedgerRepository};
pub use types::{Account, AccountId, Entry, MinorUnits, TransactionId};
