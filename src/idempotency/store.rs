//! Lock-record stores backing the idempotency gate

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Value written under an admitted key. Only its presence matters.
pub const LOCK_MARKER: &str = "locked";

#[derive(Debug, Error, Clone)]
pub enum StoreError {
    #[error("Lock service connection error: {0}")]
    Connection(String),

    #[error("Lock service command error: {0}")]
    Command(String),
}

/// Atomic check-and-create of an expiring lock record.
///
/// Implementations MUST perform the existence check and the write as a
/// single atomic operation. Two concurrent calls for the same absent key
/// must never both return `true`.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Store name for logging
    fn name(&self) -> &'static str;

    /// Create `key` with the given time-to-live if it does not exist.
    ///
    /// Returns `true` if the record was created, `false` if it already existed.
    async fn try_lock(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;
}

/// Stores for testing
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Lock service that is always down
    #[derive(Default)]
    pub struct UnavailableStore {
        calls: AtomicUsize,
    }

    impl UnavailableStore {
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl IdempotencyStore for UnavailableStore {
        fn name(&self) -> &'static str {
            "unavailable"
        }

        async fn try_lock(&self, _key: &str, _ttl: Duration) -> Result<bool, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Connection("connection refused".to_string()))
        }
    }

    /// Lock service that never answers
    pub struct HangingStore;

    #[async_trait]
    impl IdempotencyStore for HangingStore {
        fn name(&self) -> &'static str {
            "hanging"
        }

        async fn try_lock(&self, _key: &str, _ttl: Duration) -> Result<bool, StoreError> {
            std::future::pending::<()>().await;
            Ok(true)
        }
    }
}
