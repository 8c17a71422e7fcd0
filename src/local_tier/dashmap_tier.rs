use super::{LocalLookup, LocalTier};
use crate::type_token::TypeToken;
use async_trait::async_trait;
use dashmap::DashMap;
use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

enum Entry {
    Value(TypeToken, Arc<dyn Any + Send + Sync>),
    Absent,
}

struct Slot {
    entry: Entry,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|t| Instant::now() > t)
    }
}

/// Plain-`DashMap` local tier with no size bound and manual TTL expiry
/// checked on read. No background eviction thread; a long-idle deployment
/// accumulates expired entries until they are next read or `cleanup_expired`
/// is called. Useful as a dependency-light substitute for `MokaLocalTier`,
/// and in tests that want to assert on exact occupancy.
pub struct DashMapLocalTier {
    map: DashMap<String, Slot>,
    ttl: Duration,
}

impl DashMapLocalTier {
    pub fn new(ttl: Duration) -> Self {
        Self {
            map: DashMap::new(),
            ttl,
        }
    }

    pub fn cleanup_expired(&self) -> usize {
        let before = self.map.len();
        self.map.retain(|_, slot| !slot.is_expired());
        let removed = before - self.map.len();
        if removed > 0 {
            debug!(count = removed, "dashmap local tier cleaned up expired entries");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for DashMapLocalTier {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

#[async_trait]
impl LocalTier for DashMapLocalTier {
    async fn get(&self, key: &str, token: TypeToken) -> LocalLookup {
        let Some(slot) = self.map.get(key) else {
            return LocalLookup::Miss;
        };
        if slot.is_expired() {
            drop(slot);
            self.map.remove(key);
            return LocalLookup::Miss;
        }
        match &slot.entry {
            Entry::Absent => LocalLookup::Absent,
            Entry::Value(_, v) if token.matches(v.as_ref()) => LocalLookup::Hit(v.clone()),
            Entry::Value(..) => LocalLookup::Miss,
        }
    }

    async fn put(&self, key: &str, token: TypeToken, value: Arc<dyn Any + Send + Sync>) {
        self.map.insert(
            key.to_string(),
            Slot {
                entry: Entry::Value(token, value),
                expires_at: Some(Instant::now() + self.ttl),
            },
        );
    }

    async fn put_absent(&self, key: &str) {
        self.map.insert(
            key.to_string(),
            Slot {
                entry: Entry::Absent,
                expires_at: Some(Instant::now() + self.ttl),
            },
        );
    }

    async fn evict(&self, key: &str) {
        self.map.remove(key);
    }

    async fn contains(&self, key: &str) -> bool {
        match self.map.get(key) {
            Some(slot) if !slot.is_expired() => true,
            _ => false,
        }
    }

    async fn peek_type(&self, key: &str) -> Option<&'static str> {
        let slot = self.map.get(key)?;
        if slot.is_expired() {
            return None;
        }
        match &slot.entry {
            Entry::Value(token, _) => Some(token.name()),
            Entry::Absent => None,
        }
    }

    fn name(&self) -> &'static str {
        "dashmap"
    }
}
