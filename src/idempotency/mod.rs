//! Idempotency
//!
//! Request-level deduplication of client keys. The lock service (Redis in
//! production) is the sole authority for keys and is never coordinated
//! transactionally with the ledger database.
//!
//! # Contract
//!
//! ```text
//! admit(key) -> Admitted | Duplicate | Unavailable
//! ```
//!
//! A key is admitted by a single atomic check-and-create with a 24h expiry.
//! Duplicates are suppressed only; the original response is not replayed.

pub mod gate;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use gate::{Admission, IDEMPOTENCY_TTL, IdempotencyError, IdempotencyGate};
pub use memory::MemoryIdempotencyStore;
pub use redis_store::RedisIdempotencyStore;
pub use store::{IdempotencyStore, StoreError};
