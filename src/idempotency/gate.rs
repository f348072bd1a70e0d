//! Idempotency Gate
//!
//! Admits a client-supplied key at most once per TTL window. One atomic
//! round trip to the lock service per call, no retries, fail closed.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::store::IdempotencyStore;

/// Lifetime of an admitted key
pub const IDEMPOTENCY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Upper bound on a lock-service round trip before failing closed
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Namespace for keys in the shared lock service
const KEY_PREFIX: &str = "idempotency:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// First time this key is seen; proceed exactly once
    Admitted,
    /// Key already admitted; reject without re-executing
    Duplicate,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdempotencyError {
    #[error("Idempotency key is empty")]
    EmptyKey,

    /// Lock service unreachable or too slow. Callers must reject the request.
    #[error("Idempotency service unavailable: {0}")]
    Unavailable(String),
}

pub struct IdempotencyGate {
    store: Arc<dyn IdempotencyStore>,
    ttl: Duration,
    timeout: Duration,
}

impl IdempotencyGate {
    /// Gate with the standard 24h key lifetime
    pub fn new(store: Arc<dyn IdempotencyStore>) -> Self {
        Self::with_settings(store, IDEMPOTENCY_TTL, DEFAULT_TIMEOUT)
    }

    pub fn with_settings(
        store: Arc<dyn IdempotencyStore>,
        ttl: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            ttl,
            timeout,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Atomically admit or reject `key`.
    pub async fn admit(&self, key: &str) -> Result<Admission, IdempotencyError> {
        if key.trim().is_empty() {
            return Err(IdempotencyError::EmptyKey);
        }

        let lock_key = format!("{}{}", KEY_PREFIX, key);
        let attempt = self.store.try_lock(&lock_key, self.ttl);
        let created = match tokio::time::timeout(self.timeout, attempt).await {
            Ok(Ok(created)) => created,
            Ok(Err(e)) => {
                warn!(
                    store = self.store.name(),
                    error = %e,
                    "Idempotency check failed - rejecting request"
                );
                return Err(IdempotencyError::Unavailable(e.to_string()));
            }
            Err(_) => {
                warn!(
                    store = self.store.name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Idempotency check timed out - rejecting request"
                );
                return Err(IdempotencyError::Unavailable("lock service timeout".to_string()));
            }
        };

        if created {
            debug!(key, "Idempotency key admitted");
            Ok(Admission::Admitted)
        } else {
            debug!(key, "Duplicate idempotency key");
            Ok(Admission::Duplicate)
        }
    }
}
