use super::SharedTier;
use crate::error::CacheFault;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Redis-backed shared tier. Evictions `DEL` the key then `PUBLISH` it on
/// the configured invalidation channel unconditionally — a failed `DEL`
/// (key already gone, or a transient error) still publishes, since other
/// instances need the notice regardless of this instance's view of the key.
pub struct RedisSharedTier {
    conn: ConnectionManager,
    invalidation_channel: String,
}

impl RedisSharedTier {
    pub async fn connect(redis_url: &str, invalidation_channel: impl Into<String>) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        info!(channel = %redis_url, "connected redis shared tier");
        Ok(Self {
            conn,
            invalidation_channel: invalidation_channel.into(),
        })
    }

    pub fn invalidation_channel(&self) -> &str {
        &self.invalidation_channel
    }
}

#[async_trait]
impl SharedTier for RedisSharedTier {
    async fn get_bytes_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CacheFault> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<Vec<u8>>>(key)
            .await
            .map_err(|e| CacheFault::TierReadFault(e.to_string()))
    }

    async fn put_bytes(&self, key: &str, bytes: &[u8], ttl: Duration) -> Result<(), CacheFault> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, bytes, ttl.as_secs().max(1))
            .await
            .map_err(|e| CacheFault::TierWriteFault(e.to_string()))
    }

    /// A failed `DEL` (key already gone, or a transient error) is logged and
    /// tolerated rather than propagated — it doesn't mean the backend is
    /// unhealthy, just that this particular key wasn't there to remove. A
    /// failed `PUBLISH` is the real fault: other instances never hear about
    /// the eviction, so it's what the circuit breaker needs to see.
    async fn evict_raw(&self, key: &str) -> Result<(), CacheFault> {
        let mut conn = self.conn.clone();
        if let Err(err) = conn.del::<_, ()>(key).await {
            warn!(key = %key, error = %err, "redis shared tier delete failed, publishing invalidation anyway");
        }
        conn.publish::<_, _, ()>(&self.invalidation_channel, key)
            .await
            .map_err(|e| CacheFault::TierWriteFault(e.to_string()))
    }

    /// Scans the keyspace for a glob pattern via Redis `SCAN`/`MATCH`, used
    /// by `CoreEngine::invalidate_pattern`.
    async fn scan_keys(&self, pattern: &str) -> anyhow::Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut found = Vec::new();
        loop {
            let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(200)
                .query_async(&mut conn)
                .await?;
            found.extend(batch);
            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }
        debug!(pattern = %pattern, found = found.len(), "scanned redis keyspace");
        Ok(found)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
