//! The orchestrator: local-then-shared-then-loader lookup, single-flight
//! deduplication of concurrent misses, and scheduled (never awaited by the
//! caller) population and invalidation.

use crate::async_scheduler::AsyncScheduler;
use crate::codec::CacheCodec;
use crate::error::CacheLoadingFault;
use crate::local_tier::{LocalLookup, LocalTier};
use crate::shared_tier::SharedTier;
use crate::type_token::TypeToken;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const TAG_ABSENT: u8 = 0;
const TAG_PRESENT: u8 = 1;

#[derive(Clone)]
enum FlightResult {
    Present(Arc<dyn Any + Send + Sync>),
    Absent,
}

type FlightOutcome = Result<FlightResult, CacheLoadingFault>;

pub struct CoreEngine<C: CacheCodec + 'static> {
    local: Option<Arc<dyn LocalTier>>,
    shared: Option<Arc<dyn SharedTier>>,
    codec: Arc<C>,
    scheduler: Arc<AsyncScheduler>,
    shared_ttl: Duration,
    in_flight: DashMap<String, (u64, Shared<BoxFuture<'static, FlightOutcome>>)>,
    next_flight_id: AtomicU64,
}

impl<C: CacheCodec + 'static> CoreEngine<C> {
    pub fn new(
        local: Option<Arc<dyn LocalTier>>,
        shared: Option<Arc<dyn SharedTier>>,
        codec: Arc<C>,
        scheduler: Arc<AsyncScheduler>,
        shared_ttl: Duration,
    ) -> Self {
        Self {
            local,
            shared,
            codec,
            scheduler,
            shared_ttl,
            in_flight: DashMap::new(),
            next_flight_id: AtomicU64::new(0),
        }
    }

    /// Reads `key`, populating from `loader` on a miss. At most one `loader`
    /// invocation is ever in flight per key: concurrent callers that arrive
    /// while a load is in progress observe its outcome, success or failure,
    /// rather than each invoking `loader` themselves.
    pub async fn get_or_load<T, F, Fut>(
        &self,
        key: &str,
        loader: F,
    ) -> Result<Option<T>, CacheLoadingFault>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<Option<T>>> + Send + 'static,
    {
        let token = TypeToken::of::<T>();

        if let Some(local) = &self.local {
            match local.get(key, token).await {
                LocalLookup::Hit(value) => return Ok(Some(downcast(value))),
                LocalLookup::Absent => return Ok(None),
                LocalLookup::Miss => {}
            }
        }

        match self.join_or_start_flight(key, loader).await? {
            FlightResult::Present(value) => Ok(Some(downcast(value))),
            FlightResult::Absent => Ok(None),
        }
    }

    async fn join_or_start_flight<T, F, Fut>(
        &self,
        key: &str,
        loader: F,
    ) -> Result<FlightResult, CacheLoadingFault>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<Option<T>>> + Send + 'static,
    {
        let id = self.next_flight_id.fetch_add(1, Ordering::Relaxed);
        let fut = self.build_flight::<T, F, Fut>(key.to_string(), loader);
        let shared = fut.boxed().shared();

        let entry = self
            .in_flight
            .entry(key.to_string())
            .or_insert_with(|| (id, shared.clone()))
            .clone();

        let result = entry.1.await;
        self.in_flight.remove_if(key, |_, (existing_id, _)| *existing_id == entry.0);
        result
    }

    fn build_flight<T, F, Fut>(
        &self,
        key: String,
        loader: F,
    ) -> impl Future<Output = FlightOutcome> + Send + 'static
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<Option<T>>> + Send + 'static,
    {
        let shared_tier = self.shared.clone();
        let local_tier = self.local.clone();
        let codec = self.codec.clone();
        let scheduler = self.scheduler.clone();
        let ttl = self.shared_ttl;
        let token = TypeToken::of::<T>();

        async move {
            if let Some(shared_tier) = &shared_tier {
                if let Some(bytes) = shared_tier.get_bytes(&key).await {
                    match bytes.split_first() {
                        Some((&TAG_ABSENT, _)) => {
                            schedule_put_absent(&scheduler, local_tier.clone(), key.clone());
                            return Ok(FlightResult::Absent);
                        }
                        Some((&TAG_PRESENT, payload)) => match codec.decode::<T>(payload) {
                            Ok(value) => {
                                let arc: Arc<dyn Any + Send + Sync> = Arc::new(value);
                                schedule_put(&scheduler, local_tier.clone(), key.clone(), token, arc.clone());
                                return Ok(FlightResult::Present(arc));
                            }
                            Err(err) => {
                                warn!(key = %key, error = %err, "shared tier payload failed to decode, treating as miss");
                            }
                        },
                        _ => {}
                    }
                }
            }

            match loader().await {
                Ok(Some(value)) => {
                    if let Some(shared_tier) = &shared_tier {
                        match codec.encode(&value) {
                            Ok(bytes) => {
                                let mut framed = Vec::with_capacity(bytes.len() + 1);
                                framed.push(TAG_PRESENT);
                                framed.extend(bytes);
                                let shared_tier = shared_tier.clone();
                                let key = key.clone();
                                scheduler.submit(Box::pin(async move {
                                    if let Err(err) = shared_tier.put_bytes(&key, &framed, ttl).await {
                                        warn!(key = %key, error = %err, "failed to populate shared tier");
                                    }
                                }));
                            }
                            Err(err) => warn!(key = %key, error = %err, "failed to encode value for shared tier"),
                        }
                    }
                    let arc: Arc<dyn Any + Send + Sync> = Arc::new(value);
                    schedule_put(&scheduler, local_tier, key, token, arc.clone());
                    Ok(FlightResult::Present(arc))
                }
                Ok(None) => {
                    schedule_put_absent(&scheduler, local_tier, key.clone());
                    if let Some(shared_tier) = shared_tier {
                        scheduler.submit(Box::pin(async move {
                            if let Err(err) = shared_tier.put_bytes(&key, &[TAG_ABSENT], ttl).await {
                                warn!(key = %key, error = %err, "failed to cache absent result on shared tier");
                            }
                        }));
                    }
                    Ok(FlightResult::Absent)
                }
                Err(err) => Err(CacheLoadingFault::from_loader_error(err)),
            }
        }
    }

    /// Batch lookup. Content populated by the batch loader and content
    /// promoted from the shared tier are unioned uniformly into the
    /// returned map and into both tiers — a key present only on the shared
    /// tier is treated the same as one the loader just produced.
    pub async fn get_or_load_all<T, F, Fut>(
        &self,
        keys: &[String],
        batch_loader: F,
    ) -> Result<HashMap<String, T>, CacheLoadingFault>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnOnce(Vec<String>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<HashMap<String, T>>> + Send + 'static,
    {
        let token = TypeToken::of::<T>();
        let mut result: HashMap<String, T> = HashMap::with_capacity(keys.len());
        let mut remaining: Vec<String> = Vec::new();

        let mut local_puts: Vec<(String, TypeToken, Arc<dyn Any + Send + Sync>)> = Vec::new();
        let mut local_absents: Vec<String> = Vec::new();
        let mut shared_puts: Vec<(String, Vec<u8>)> = Vec::new();

        if let Some(local) = &self.local {
            let hits = local.get_all(keys, token).await;
            for key in keys {
                match hits.get(key) {
                    Some(LocalLookup::Hit(value)) => {
                        result.insert(key.clone(), downcast(value.clone()));
                    }
                    Some(LocalLookup::Absent) => {}
                    Some(LocalLookup::Miss) | None => remaining.push(key.clone()),
                }
            }
        } else {
            remaining.extend(keys.iter().cloned());
        }

        if remaining.is_empty() {
            return Ok(result);
        }

        let mut still_remaining = Vec::new();
        if let Some(shared_tier) = &self.shared {
            let fetched = shared_tier.get_all_bytes(&remaining).await;
            for key in &remaining {
                match fetched.get(key) {
                    Some(bytes) => match bytes.split_first() {
                        Some((&TAG_ABSENT, _)) => {
                            local_absents.push(key.clone());
                        }
                        Some((&TAG_PRESENT, payload)) => match self.codec.decode::<T>(payload) {
                            Ok(value) => {
                                let arc: Arc<dyn Any + Send + Sync> = Arc::new(value.clone());
                                local_puts.push((key.clone(), token, arc));
                                result.insert(key.clone(), value);
                            }
                            Err(err) => {
                                warn!(key = %key, error = %err, "batch decode failed, re-fetching via loader");
                                still_remaining.push(key.clone());
                            }
                        },
                        _ => still_remaining.push(key.clone()),
                    },
                    None => still_remaining.push(key.clone()),
                }
            }
        } else {
            still_remaining = remaining;
        }

        if !still_remaining.is_empty() {
            let loaded = batch_loader(still_remaining.clone())
                .await
                .map_err(CacheLoadingFault::from_loader_error)?;

            for key in &still_remaining {
                match loaded.get(key) {
                    Some(value) => {
                        let arc: Arc<dyn Any + Send + Sync> = Arc::new(value.clone());
                        local_puts.push((key.clone(), token, arc));
                        if let Ok(bytes) = self.codec.encode(value) {
                            let mut framed = Vec::with_capacity(bytes.len() + 1);
                            framed.push(TAG_PRESENT);
                            framed.extend(bytes);
                            shared_puts.push((key.clone(), framed));
                        }
                        result.insert(key.clone(), value.clone());
                    }
                    None => {
                        local_absents.push(key.clone());
                        shared_puts.push((key.clone(), vec![TAG_ABSENT]));
                    }
                }
            }
        }

        // Deferred to a single scheduled task so a batch miss doesn't block
        // this call's caller on L2 latency, the same way get_or_load's single
        // writes never block its caller: L2 is populated before L1, matching
        // the ordering a cross-instance invalidation race would expect.
        if !local_puts.is_empty() || !local_absents.is_empty() || !shared_puts.is_empty() {
            let local_tier = self.local.clone();
            let shared_tier = self.shared.clone();
            let ttl = self.shared_ttl;
            self.scheduler.submit(Box::pin(async move {
                if let Some(shared_tier) = &shared_tier {
                    shared_tier.put_all_bytes(shared_puts, ttl).await;
                }
                if let Some(local) = &local_tier {
                    local.put_all(local_puts).await;
                    for key in local_absents {
                        local.put_absent(&key).await;
                    }
                }
            }));
        }

        Ok(result)
    }

    /// Reports which tier currently holds `key`, without promoting or
    /// populating either — a direct read for the inspection shim, distinct
    /// from `get_or_load`'s side-effecting path.
    pub async fn probe_presence(&self, key: &str) -> (crate::inspection::FoundIn, Option<&'static str>) {
        use crate::inspection::FoundIn;
        if let Some(local) = &self.local {
            if local.contains(key).await {
                return (FoundIn::Local, local.peek_type(key).await);
            }
        }
        if let Some(shared) = &self.shared {
            if shared.get_bytes(key).await.is_some() {
                return (FoundIn::Shared, None);
            }
        }
        (FoundIn::Neither, None)
    }

    /// Schedules eviction of `key` from both tiers; never awaited by the
    /// caller. The shared tier is evicted (and its publish observed) strictly
    /// before the local tier, so another instance's subscriber never races
    /// this one's own local clear.
    pub async fn invalidate(&self, key: &str) {
        let key = key.to_string();
        let local = self.local.clone();
        let shared = self.shared.clone();
        self.scheduler.submit(Box::pin(async move {
            if let Some(shared) = shared {
                shared.evict(&key).await;
            }
            if let Some(local) = local {
                local.evict(&key).await;
            }
        }));
    }

    pub async fn invalidate_all(&self, keys: &[String]) {
        let keys = keys.to_vec();
        let local = self.local.clone();
        let shared = self.shared.clone();
        self.scheduler.submit(Box::pin(async move {
            if let Some(shared) = shared {
                shared.evict_all(&keys).await;
            }
            if let Some(local) = local {
                local.evict_all(&keys).await;
            }
        }));
    }

    /// Scans the shared tier for keys matching a glob `pattern` and schedules
    /// their eviction the same way `invalidate_all` would. Requires a shared
    /// tier that implements `SharedTier::scan_keys` for real (only
    /// [`crate::shared_tier::RedisSharedTier`] does; others report no
    /// matches). The scan itself is awaited, since the key list has to be
    /// known before eviction can be scheduled.
    pub async fn invalidate_pattern(&self, pattern: &str) -> anyhow::Result<()> {
        let Some(shared) = self.shared.as_ref() else {
            return Ok(());
        };
        let matched = shared.scan_keys(pattern).await?;
        if matched.is_empty() {
            return Ok(());
        }
        self.invalidate_all(&matched).await;
        Ok(())
    }
}

// The local tier keeps its own `Arc` to every stored value, so a caller can
// never take ownership of it outright — `T` is required to be `Clone` for
// exactly this reason, the same constraint `moka` itself imposes on cached
// values.
fn downcast<T: Clone + 'static>(value: Arc<dyn Any + Send + Sync>) -> T {
    value
        .downcast_ref::<T>()
        .cloned()
        .expect("TypeToken already verified this downcast at lookup time")
}

fn schedule_put(
    scheduler: &Arc<AsyncScheduler>,
    local_tier: Option<Arc<dyn LocalTier>>,
    key: String,
    token: TypeToken,
    value: Arc<dyn Any + Send + Sync>,
) {
    if let Some(local) = local_tier {
        scheduler.submit(Box::pin(async move {
            local.put(&key, token, value).await;
        }));
    }
}

fn schedule_put_absent(scheduler: &Arc<AsyncScheduler>, local_tier: Option<Arc<dyn LocalTier>>, key: String) {
    if let Some(local) = local_tier {
        scheduler.submit(Box::pin(async move {
            debug!(key = %key, "caching confirmed-absent result locally");
            local.put_absent(&key).await;
        }));
    }
}
