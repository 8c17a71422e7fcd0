//! Shared fixtures for integration tests.
//!
//! Everything here builds against [`InMemorySharedTier`] so the suite runs
//! without a live Redis instance. A handful of `#[ignore]`d tests elsewhere
//! exercise [`RedisSharedTier`] directly against `REDIS_URL` when one is set.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tierwise::{CacheEngineBuilder, CacheEngineConfig, CircuitBreakerConfig, CoreEngine, InMemorySharedTier, JsonCodec};

pub fn test_key(name: &str) -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    format!("test:{name}:{nanos}")
}

/// An engine wired to a fresh in-memory shared tier and the default local
/// tier, with a short shared TTL so TTL-expiry tests don't have to wait.
pub fn build_engine() -> Arc<CoreEngine<JsonCodec>> {
    let shared = Arc::new(InMemorySharedTier::new());
    CacheEngineBuilder::new()
        .with_shared_tier(shared)
        .with_config(CacheEngineConfig {
            shared_ttl: Duration::from_secs(60),
            ..CacheEngineConfig::default()
        })
        .build()
}

/// Returns the engine together with a handle to its backing in-memory
/// shared tier, for tests that need to poke at the shared tier directly
/// (fault injection, inspecting raw bytes, subscribing to invalidations).
pub fn build_engine_with_shared() -> (Arc<CoreEngine<JsonCodec>>, Arc<InMemorySharedTier>) {
    let shared = Arc::new(InMemorySharedTier::new());
    let engine = CacheEngineBuilder::new()
        .with_shared_tier(shared.clone())
        .with_config(CacheEngineConfig {
            shared_ttl: Duration::from_secs(60),
            ..CacheEngineConfig::default()
        })
        .build();
    (engine, shared)
}

pub fn build_engine_with_breaker(breaker: CircuitBreakerConfig) -> (Arc<CoreEngine<JsonCodec>>, Arc<InMemorySharedTier>) {
    let shared = Arc::new(InMemorySharedTier::new());
    let engine = CacheEngineBuilder::new()
        .with_shared_tier(shared.clone())
        .with_config(CacheEngineConfig {
            shared_ttl: Duration::from_secs(60),
            circuit_breaker: breaker,
            ..CacheEngineConfig::default()
        })
        .build();
    (engine, shared)
}

/// Wires a caller-supplied local tier (so the test can inspect it directly)
/// together with a fresh in-memory shared tier.
pub fn build_engine_with_local(
    local: Arc<tierwise::DashMapLocalTier>,
) -> (Arc<CoreEngine<JsonCodec>>, Arc<InMemorySharedTier>) {
    let shared = Arc::new(InMemorySharedTier::new());
    let engine = CacheEngineBuilder::new()
        .with_local_tier(local)
        .with_shared_tier(shared.clone())
        .with_config(CacheEngineConfig {
            shared_ttl: Duration::from_secs(60),
            ..CacheEngineConfig::default()
        })
        .build();
    (engine, shared)
}

/// Frames a value the way `CoreEngine` frames a present shared-tier payload:
/// a leading `1` tag byte followed by JSON-encoded bytes.
pub fn frame_present<T: serde::Serialize>(value: &T) -> Vec<u8> {
    let mut framed = vec![1u8];
    framed.extend(serde_json::to_vec(value).unwrap());
    framed
}

pub mod test_data {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct User {
        pub id: u64,
        pub name: String,
        pub email: String,
    }

    impl User {
        pub fn new(id: u64) -> Self {
            Self {
                id,
                name: format!("User {id}"),
                email: format!("user{id}@example.com"),
            }
        }
    }
}

/// Counts how many times a loader was actually invoked, for asserting
/// single-flight and cache-hit behavior without relying on timing.
#[derive(Clone, Default)]
pub struct LoadCounter(Arc<AtomicU32>);

impl LoadCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn mark(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

pub async fn wait_for<F>(mut condition: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(timeout_ms);
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Like [`wait_for`] but for conditions that themselves need to `.await` —
/// used to poll a tier after the engine schedules (rather than awaits)
/// population or invalidation.
pub async fn poll_until<F, Fut>(mut condition: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(timeout_ms);
    while start.elapsed() < timeout {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
