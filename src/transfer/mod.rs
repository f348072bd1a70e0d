//! Atomic Transfers
//!
//! Moves funds between ledger accounts and enqueues the payout for the
//! credited account in the same database transaction (transactional outbox).
//!
//! # Flow
//!
//! ```text
//! submit(key, req) → validate → IdempotencyGate::admit
//!                  → TransferEngine::execute_transfer
//!                       BEGIN
//!                       lock accounts (id order) → check funds
//!                       debit entry + credit entry → balances
//!                       payout task (PENDING)
//!                       COMMIT
//! ```
//!
//! # Invariants
//!
//! 1. **Zero-sum**: the two entries of a transfer sum to zero
//! 2. **Outbox**: a payout task exists if and only if its transfer committed
//! 3. **No overdraft**: the source balance never goes below zero

pub mod engine;
pub mod error;
pub mod service;
pub mod types;

pub use engine::TransferEngine;
pub use error::TransferError;
pub use service::TransferService;
pub use types::{TransferReceipt, TransferRequest};
