//! Redis-backed idempotency store
//!
//! Uses `SET key value NX EX ttl`, which checks and creates in one command.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;

use super::store::{IdempotencyStore, LOCK_MARKER, StoreError};

#[derive(Clone)]
pub struct RedisIdempotencyStore {
    conn: ConnectionManager,
}

impl RedisIdempotencyStore {
    /// Connect to Redis (e.g. "redis://localhost:6379")
    ///
    /// The connection manager reconnects on its own after a drop; commands
    /// issued while disconnected fail and surface as `StoreError`.
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client =
            redis::Client::open(redis_url).map_err(|e| StoreError::Connection(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        tracing::info!("Redis connection established");
        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl IdempotencyStore for RedisIdempotencyStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn try_lock(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        // Reply is "OK" when set, nil when the key already exists
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(LOCK_MARKER)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))?;

        Ok(reply.is_some())
    }
}
