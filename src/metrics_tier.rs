//! Observability decorators. Every call is timed and classified; failures
//! are observed (the duration still recorded) then passed through
//! unchanged — this module never swallows an error the way the circuit
//! breaker does.

use crate::error::CacheFault;
use crate::local_tier::{LocalLookup, LocalTier};
use crate::shared_tier::SharedTier;
use crate::type_token::TypeToken;
use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn key_prefix(key: &str) -> String {
    match key.split_once(':') {
        Some((prefix, _)) => prefix.to_string(),
        None => "none".to_string(),
    }
}

fn record_latency(level: &'static str, operation: &'static str, prefix: &str, elapsed: Duration) {
    metrics::histogram!("cache.latency", "level" => level, "operation" => operation, "key.prefix" => prefix.to_string())
        .record(elapsed.as_secs_f64());
}

pub struct MetricsLocalTier<T: LocalTier + ?Sized> {
    inner: Arc<T>,
}

impl<T: LocalTier + ?Sized> MetricsLocalTier<T> {
    pub fn new(inner: Arc<T>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<T: LocalTier + ?Sized> LocalTier for MetricsLocalTier<T> {
    async fn get(&self, key: &str, token: TypeToken) -> LocalLookup {
        let prefix = key_prefix(key);
        let start = Instant::now();
        let result = self.inner.get(key, token).await;
        record_latency("l1", "get", &prefix, start.elapsed());
        match &result {
            LocalLookup::Hit(_) => metrics::counter!("cache.hits", "level" => "l1", "key.prefix" => prefix).increment(1),
            LocalLookup::Absent => metrics::counter!("cache.hits.absent", "level" => "l1", "key.prefix" => prefix).increment(1),
            LocalLookup::Miss => metrics::counter!("cache.misses", "level" => "l1", "key.prefix" => prefix).increment(1),
        }
        result
    }

    async fn put(&self, key: &str, token: TypeToken, value: Arc<dyn Any + Send + Sync>) {
        let prefix = key_prefix(key);
        let start = Instant::now();
        self.inner.put(key, token, value).await;
        record_latency("l1", "put", &prefix, start.elapsed());
    }

    async fn put_absent(&self, key: &str) {
        self.inner.put_absent(key).await;
    }

    async fn evict(&self, key: &str) {
        self.inner.evict(key).await;
    }

    async fn contains(&self, key: &str) -> bool {
        self.inner.contains(key).await
    }

    async fn peek_type(&self, key: &str) -> Option<&'static str> {
        self.inner.peek_type(key).await
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

pub struct MetricsSharedTier<T: SharedTier + ?Sized> {
    inner: Arc<T>,
}

impl<T: SharedTier + ?Sized> MetricsSharedTier<T> {
    pub fn new(inner: Arc<T>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<T: SharedTier + ?Sized> SharedTier for MetricsSharedTier<T> {
    async fn get_bytes_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CacheFault> {
        let prefix = key_prefix(key);
        let start = Instant::now();
        let result = self.inner.get_bytes_raw(key).await;
        record_latency("l2", "get", &prefix, start.elapsed());
        match &result {
            Ok(Some(_)) => metrics::counter!("cache.hits", "level" => "l2", "key.prefix" => prefix).increment(1),
            Ok(None) => metrics::counter!("cache.misses", "level" => "l2", "key.prefix" => prefix).increment(1),
            Err(err) => metrics::counter!("cache.errors", "level" => "l2", "fault" => fault_name(err)).increment(1),
        }
        result
    }

    async fn put_bytes(&self, key: &str, bytes: &[u8], ttl: Duration) -> Result<(), CacheFault> {
        let prefix = key_prefix(key);
        let start = Instant::now();
        let result = self.inner.put_bytes(key, bytes, ttl).await;
        record_latency("l2", "put", &prefix, start.elapsed());
        metrics::histogram!("cache.payload_bytes", "level" => "l2").record(bytes.len() as f64);
        if let Err(err) = &result {
            metrics::counter!("cache.errors", "level" => "l2", "fault" => fault_name(err)).increment(1);
        }
        result
    }

    async fn evict_raw(&self, key: &str) -> Result<(), CacheFault> {
        let prefix = key_prefix(key);
        let start = Instant::now();
        let result = self.inner.evict_raw(key).await;
        record_latency("l2", "evict", &prefix, start.elapsed());
        if let Err(err) = &result {
            metrics::counter!("cache.errors", "level" => "l2", "fault" => fault_name(err)).increment(1);
        }
        result
    }

    /// Forwarded straight to the wrapped tier rather than left to the
    /// trait's one-by-one default, so a real batch implementation underneath
    /// (e.g. a Redis `MGET`) stays reachable through this decorator.
    async fn get_all_bytes(&self, keys: &[String]) -> HashMap<String, Vec<u8>> {
        let start = Instant::now();
        let result = self.inner.get_all_bytes(keys).await;
        record_latency("l2", "get_all", "batch", start.elapsed());
        result
    }

    async fn put_all_bytes(&self, items: Vec<(String, Vec<u8>)>, ttl: Duration) {
        let start = Instant::now();
        self.inner.put_all_bytes(items, ttl).await;
        record_latency("l2", "put_all", "batch", start.elapsed());
    }

    async fn evict_all(&self, keys: &[String]) {
        let start = Instant::now();
        self.inner.evict_all(keys).await;
        record_latency("l2", "evict_all", "batch", start.elapsed());
    }

    async fn scan_keys(&self, pattern: &str) -> anyhow::Result<Vec<String>> {
        self.inner.scan_keys(pattern).await
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

fn fault_name(fault: &CacheFault) -> &'static str {
    match fault {
        CacheFault::TierReadFault(_) => "tier_read_fault",
        CacheFault::TierWriteFault(_) => "tier_write_fault",
        CacheFault::TierUnavailable(_) => "tier_unavailable",
        CacheFault::CodecFault(_) => "codec_fault",
    }
}
