//! Fluent construction of a [`CoreEngine`]: pick backends, pick a codec, get
//! back a wired engine with sane defaults if you pick nothing.

use crate::async_scheduler::{AsyncScheduler, AsyncSchedulerConfig};
use crate::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerTier};
use crate::codec::{CacheCodec, JsonCodec};
use crate::core_engine::CoreEngine;
use crate::local_tier::LocalTier;
#[cfg(feature = "moka")]
use crate::local_tier::{MokaLocalTier, MokaLocalTierConfig};
use crate::metrics_tier::{MetricsLocalTier, MetricsSharedTier};
use crate::shared_tier::SharedTier;
use std::sync::Arc;
use std::time::Duration;

pub struct CacheEngineConfig {
    pub local_enabled: bool,
    pub shared_ttl: Duration,
    pub circuit_breaker: CircuitBreakerConfig,
    pub scheduler: AsyncSchedulerConfig,
}

impl Default for CacheEngineConfig {
    fn default() -> Self {
        Self {
            local_enabled: true,
            shared_ttl: Duration::from_secs(300),
            circuit_breaker: CircuitBreakerConfig::default(),
            scheduler: AsyncSchedulerConfig::default(),
        }
    }
}

pub struct CacheEngineBuilder<C: CacheCodec + 'static = JsonCodec> {
    local: Option<Arc<dyn LocalTier>>,
    shared: Option<Arc<dyn SharedTier>>,
    codec: Arc<C>,
    config: CacheEngineConfig,
}

impl CacheEngineBuilder<JsonCodec> {
    pub fn new() -> Self {
        Self {
            local: None,
            shared: None,
            codec: Arc::new(JsonCodec),
            config: CacheEngineConfig::default(),
        }
    }
}

impl Default for CacheEngineBuilder<JsonCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: CacheCodec + 'static> CacheEngineBuilder<C> {
    pub fn with_codec<C2: CacheCodec + 'static>(self, codec: Arc<C2>) -> CacheEngineBuilder<C2> {
        CacheEngineBuilder {
            local: self.local,
            shared: self.shared,
            codec,
            config: self.config,
        }
    }

    pub fn with_local_tier(mut self, tier: Arc<dyn LocalTier>) -> Self {
        self.local = Some(tier);
        self
    }

    /// Wraps `tier` with circuit-breaker and metrics decorators, in that
    /// order: the breaker sees the raw backend's latency, and metrics sees
    /// only what the breaker let through.
    pub fn with_shared_tier<T: SharedTier + 'static>(mut self, tier: Arc<T>) -> Self {
        let breaker = Arc::new(CircuitBreakerTier::new(tier, self.config.circuit_breaker));
        self.shared = Some(Arc::new(MetricsSharedTier::new(breaker)));
        self
    }

    pub fn with_config(mut self, config: CacheEngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Arc<CoreEngine<C>> {
        let local = if self.config.local_enabled {
            self.local.or_else(default_local_tier)
        } else {
            None
        };
        let local = local.map(|tier| Arc::new(MetricsLocalTier::new(tier)) as Arc<dyn LocalTier>);
        let scheduler = Arc::new(AsyncScheduler::new(self.config.scheduler));
        Arc::new(CoreEngine::new(
            local,
            self.shared,
            self.codec,
            scheduler,
            self.config.shared_ttl,
        ))
    }
}

#[cfg(feature = "moka")]
fn default_local_tier() -> Option<Arc<dyn LocalTier>> {
    Some(Arc::new(MokaLocalTier::new(MokaLocalTierConfig::default())))
}

#[cfg(not(feature = "moka"))]
fn default_local_tier() -> Option<Arc<dyn LocalTier>> {
    use crate::local_tier::DashMapLocalTier;
    Some(Arc::new(DashMapLocalTier::default()))
}
