use super::{LocalLookup, LocalTier};
use crate::type_token::TypeToken;
use async_trait::async_trait;
use moka::future::Cache;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
enum StoredEntry {
    Value(TypeToken, Arc<dyn Any + Send + Sync>),
    Absent,
}

/// Sizing and expiry for the default local tier.
///
/// Eviction policy itself (which entries get dropped once `max_capacity` is
/// exceeded) is left entirely to `moka`'s own LRU-ish admission/eviction
/// policies; this crate only configures the knobs `moka` exposes.
#[derive(Debug, Clone, Copy)]
pub struct MokaLocalTierConfig {
    pub max_capacity: u64,
    pub time_to_live: Duration,
    pub time_to_idle: Duration,
}

impl Default for MokaLocalTierConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            time_to_live: Duration::from_secs(300),
            time_to_idle: Duration::from_secs(60),
        }
    }
}

/// Default local tier. Per-key TTL is not modeled here: `moka`'s
/// `time_to_live`/`time_to_idle` apply uniformly, which matches this
/// engine's local tier contract (the shared tier is where per-write TTL
/// matters; the local tier is a short-lived hot cache above it).
pub struct MokaLocalTier {
    cache: Cache<String, StoredEntry>,
}

impl MokaLocalTier {
    pub fn new(config: MokaLocalTierConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.time_to_live)
            .time_to_idle(config.time_to_idle)
            .build();
        Self { cache }
    }
}

impl Default for MokaLocalTier {
    fn default() -> Self {
        Self::new(MokaLocalTierConfig::default())
    }
}

#[async_trait]
impl LocalTier for MokaLocalTier {
    async fn get(&self, key: &str, token: TypeToken) -> LocalLookup {
        match self.cache.get(key).await {
            Some(StoredEntry::Absent) => LocalLookup::Absent,
            Some(StoredEntry::Value(_, value)) => {
                if token.matches(value.as_ref()) {
                    LocalLookup::Hit(value)
                } else {
                    debug!(key = %key, "local tier type mismatch, treating as miss");
                    LocalLookup::Miss
                }
            }
            None => LocalLookup::Miss,
        }
    }

    async fn put(&self, key: &str, token: TypeToken, value: Arc<dyn Any + Send + Sync>) {
        self.cache
            .insert(key.to_string(), StoredEntry::Value(token, value))
            .await;
    }

    async fn put_absent(&self, key: &str) {
        self.cache
            .insert(key.to_string(), StoredEntry::Absent)
            .await;
    }

    async fn evict(&self, key: &str) {
        self.cache.remove(key).await;
    }

    async fn contains(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    async fn peek_type(&self, key: &str) -> Option<&'static str> {
        match self.cache.get(key).await {
            Some(StoredEntry::Value(token, _)) => Some(token.name()),
            Some(StoredEntry::Absent) | None => None,
        }
    }

    fn name(&self) -> &'static str {
        "moka"
    }
}
