use super::SharedTier;
use crate::error::CacheFault;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
#[cfg(test)]
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

struct Slot {
    bytes: Vec<u8>,
    expires_at: Instant,
}

/// In-process stand-in for a distributed shared tier. Used by integration
/// tests so the seed scenarios run without a live Redis instance, and by
/// applications developing against a single process. Publishes evictions on
/// a `tokio::sync::broadcast` channel instead of Redis Pub/Sub; `InvalidationBus`
/// can subscribe to either.
pub struct InMemorySharedTier {
    map: DashMap<String, Slot>,
    invalidations: broadcast::Sender<String>,
    /// When set, every read/write fails — used to drive circuit breaker tests.
    fail_next_calls: AtomicBool,
    failure_count: AtomicU64,
}

impl InMemorySharedTier {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(1024);
        Self {
            map: DashMap::new(),
            invalidations: tx,
            fail_next_calls: AtomicBool::new(false),
            failure_count: AtomicU64::new(0),
        }
    }

    pub fn subscribe_invalidations(&self) -> broadcast::Receiver<String> {
        self.invalidations.subscribe()
    }

    /// Test hook: force every subsequent call to fail until cleared.
    pub fn set_failing(&self, failing: bool) {
        self.fail_next_calls.store(failing, Ordering::SeqCst);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::SeqCst)
    }

    fn check_fault(&self) -> Result<(), CacheFault> {
        if self.fail_next_calls.load(Ordering::SeqCst) {
            self.failure_count.fetch_add(1, Ordering::SeqCst);
            return Err(CacheFault::TierUnavailable("injected test failure".into()));
        }
        Ok(())
    }
}

impl Default for InMemorySharedTier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SharedTier for InMemorySharedTier {
    async fn get_bytes_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CacheFault> {
        self.check_fault()?;
        let Some(slot) = self.map.get(key) else {
            return Ok(None);
        };
        if Instant::now() > slot.expires_at {
            drop(slot);
            self.map.remove(key);
            return Ok(None);
        }
        Ok(Some(slot.bytes.clone()))
    }

    async fn put_bytes(&self, key: &str, bytes: &[u8], ttl: Duration) -> Result<(), CacheFault> {
        self.check_fault()?;
        self.map.insert(
            key.to_string(),
            Slot {
                bytes: bytes.to_vec(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn evict_raw(&self, key: &str) -> Result<(), CacheFault> {
        self.check_fault()?;
        self.map.remove(key);
        let _ = self.invalidations.send(key.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}
