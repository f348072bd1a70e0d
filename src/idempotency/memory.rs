//! Process-local idempotency store
//!
//! Only correct when a single gateway process admits keys. Used for local
//! runs (`idempotency.backend: memory`) and tests.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::{Duration, Instant};

use super::store::{IdempotencyStore, StoreError};

/// Key -> expiry instant
#[derive(Default)]
pub struct MemoryIdempotencyStore {
    keys: DashMap<String, Instant>,
}

impl MemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired records
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.keys.len();
        self.keys.retain(|_, expires_at| *expires_at > now);
        before - self.keys.len()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[async_trait]
impl IdempotencyStore for MemoryIdempotencyStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn try_lock(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = Instant::now();
        // The shard write lock held by `entry` makes check-and-create atomic
        match self.keys.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if *occupied.get() <= now {
                    occupied.insert(now + ttl);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(now + ttl);
                Ok(true)
            }
        }
    }
}
