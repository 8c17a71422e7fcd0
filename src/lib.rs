//! Tierwise
//!
//! A two-tier (local + shared) read-through, write-behind cache engine:
//! - **Local tier**: in-process, native-typed storage (Moka by default)
//! - **Shared tier**: distributed storage behind a circuit breaker (Redis by default)
//! - **Single-flight**: at most one loader invocation per key is ever in flight
//! - **Negative-result caching**: a confirmed "nothing here" is cached, not just a miss
//! - **Cross-process invalidation**: writes to the shared tier notify every
//!   other instance subscribed to its invalidation channel
//!
//! # Quick start
//!
//! ```rust,no_run
//! use tierwise::CacheEngineBuilder;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = CacheEngineBuilder::new().build();
//!
//!     let user: Option<String> = engine
//!         .get_or_load("user:1", || async { Ok(Some("alice".to_string())) })
//!         .await?;
//!
//!     println!("{user:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! get_or_load(key) -> local tier -> shared tier -> loader
//!                      hit: return   hit: promote   miss: invoke once,
//!                                    to local        fan out to both tiers
//! ```

pub mod async_scheduler;
pub mod builder;
pub mod circuit_breaker;
pub mod codec;
pub mod core_engine;
pub mod error;
pub mod inspection;
pub mod invalidation;
pub mod local_tier;
pub mod metrics_tier;
pub mod shared_tier;
pub mod type_token;

pub use async_scheduler::{AsyncScheduler, AsyncSchedulerConfig};
pub use builder::{CacheEngineBuilder, CacheEngineConfig};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerTier};
pub use codec::{CacheCodec, JsonCodec};
#[cfg(feature = "postcard")]
pub use codec::PostcardCodec;
pub use core_engine::CoreEngine;
pub use error::{CacheFault, CacheLoadingFault};
pub use inspection::Inspector;
pub use invalidation::{InvalidationBus, InvalidationBusConfig};
pub use local_tier::{DashMapLocalTier, LocalLookup, LocalTier};
#[cfg(feature = "moka")]
pub use local_tier::{MokaLocalTier, MokaLocalTierConfig};
pub use shared_tier::{InMemorySharedTier, SharedTier};
#[cfg(feature = "redis")]
pub use shared_tier::RedisSharedTier;
pub use type_token::{AbsentMarker, TypeToken};

// Re-exported so application code implementing a custom tier doesn't need
// its own `async-trait` dependency just to satisfy this crate's traits.
pub use async_trait::async_trait;
