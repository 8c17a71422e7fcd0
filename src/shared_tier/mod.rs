//! The slow, distributed tier. Stores codec-encoded bytes and is the origin
//! of cross-process invalidation: every `evict`/`evict_all` both deletes and
//! publishes, so no caller can delete without also notifying other
//! instances.

#[cfg(feature = "redis")]
mod redis_tier;
mod in_memory_tier;

#[cfg(feature = "redis")]
pub use redis_tier::RedisSharedTier;
pub use in_memory_tier::InMemorySharedTier;

use crate::error::CacheFault;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

#[async_trait]
pub trait SharedTier: Send + Sync {
    /// Fallible read. Backends surface a real transport/storage error here
    /// instead of folding it into `None`, so a decorator sitting above them
    /// (the circuit breaker, in particular) can tell "key not present" apart
    /// from "couldn't ask".
    async fn get_bytes_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CacheFault>;

    async fn put_bytes(&self, key: &str, bytes: &[u8], ttl: Duration) -> Result<(), CacheFault>;

    /// Deletes the key and publishes its invalidation, in that order, even
    /// if the delete finds nothing to remove — subscribers must be told a
    /// key may no longer be valid regardless of whether this instance held
    /// it.
    async fn evict_raw(&self, key: &str) -> Result<(), CacheFault>;

    /// Downgrades a read fault to a miss. Callers that only care about
    /// presence (the read-through path, once the circuit breaker has already
    /// had a chance to observe the real outcome) use this instead of
    /// `get_bytes_raw`.
    async fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        match self.get_bytes_raw(key).await {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "shared tier read failed, treating as a miss");
                None
            }
        }
    }

    /// Downgrades an evict fault to a logged no-op.
    async fn evict(&self, key: &str) {
        if let Err(err) = self.evict_raw(key).await {
            tracing::warn!(key = %key, error = %err, "shared tier evict failed");
        }
    }

    async fn get_all_bytes_raw(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>, CacheFault> {
        let mut out = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(bytes) = self.get_bytes_raw(key).await? {
                out.insert(key.clone(), bytes);
            }
        }
        Ok(out)
    }

    async fn get_all_bytes(&self, keys: &[String]) -> HashMap<String, Vec<u8>> {
        match self.get_all_bytes_raw(keys).await {
            Ok(out) => out,
            Err(err) => {
                tracing::warn!(error = %err, "shared tier batch read failed, treating as all-miss");
                HashMap::new()
            }
        }
    }

    async fn put_all_bytes(&self, items: Vec<(String, Vec<u8>)>, ttl: Duration) {
        for (key, bytes) in items {
            if let Err(err) = self.put_bytes(&key, &bytes, ttl).await {
                tracing::warn!(key = %key, error = %err, "shared tier batch write failed for one key");
            }
        }
    }

    async fn evict_all(&self, keys: &[String]) {
        for key in keys {
            self.evict(key).await;
        }
    }

    /// Lists keys matching a glob `pattern`. Backends without a native scan
    /// (e.g. [`InMemorySharedTier`]) return an empty list rather than error,
    /// since pattern invalidation degrades to a no-op rather than a failure
    /// when unsupported.
    async fn scan_keys(&self, pattern: &str) -> anyhow::Result<Vec<String>> {
        let _ = pattern;
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str;
}
