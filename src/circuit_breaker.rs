//! Guards the shared tier against a degraded backend: once failures (or slow
//! calls) cross a threshold over a sliding window, calls short-circuit to a
//! local no-op instead of piling onto a struggling Redis.

use crate::error::CacheFault;
use crate::shared_tier::SharedTier;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

impl State {
    fn to_u8(self) -> u8 {
        match self {
            State::Closed => 0,
            State::Open => 1,
            State::HalfOpen => 2,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => State::Open,
            2 => State::HalfOpen,
            _ => State::Closed,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Outcome {
    success: bool,
    slow: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub window_size: usize,
    pub failure_rate_threshold: f64,
    pub slow_call_duration_threshold: Duration,
    pub slow_call_rate_threshold: f64,
    pub permitted_calls_in_half_open: usize,
    pub wait_duration_in_open_state: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            window_size: 20,
            failure_rate_threshold: 0.5,
            slow_call_duration_threshold: Duration::from_millis(500),
            slow_call_rate_threshold: 0.8,
            permitted_calls_in_half_open: 5,
            wait_duration_in_open_state: Duration::from_secs(30),
        }
    }
}

/// Sliding-window failure/slow-call detector with a CLOSED/OPEN/HALF_OPEN
/// state machine.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: AtomicU8,
    opened_at: Mutex<Option<Instant>>,
    window: Mutex<VecDeque<Outcome>>,
    half_open_probes_in_flight: Mutex<usize>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: AtomicU8::new(State::Closed.to_u8()),
            opened_at: Mutex::new(None),
            window: Mutex::new(VecDeque::with_capacity(config.window_size)),
            half_open_probes_in_flight: Mutex::new(0),
        }
    }

    fn state(&self) -> State {
        State::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: State) {
        self.state.store(state.to_u8(), Ordering::Release);
    }

    /// Must be checked before every call the breaker guards. In `Open`
    /// state, allows through only after `wait_duration_in_open_state` has
    /// elapsed (flipping to `HalfOpen` and admitting a bounded number of
    /// probes).
    pub fn allow_request(&self) -> bool {
        match self.state() {
            State::Closed => true,
            State::HalfOpen => {
                let mut in_flight = self.half_open_probes_in_flight.lock();
                if *in_flight < self.config.permitted_calls_in_half_open {
                    *in_flight += 1;
                    true
                } else {
                    false
                }
            }
            State::Open => {
                let elapsed = self
                    .opened_at
                    .lock()
                    .map(|since| since.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.config.wait_duration_in_open_state {
                    info!("circuit breaker transitioning open -> half-open");
                    self.set_state(State::HalfOpen);
                    *self.half_open_probes_in_flight.lock() = 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_outcome(&self, success: bool, elapsed: Duration) {
        let slow = elapsed >= self.config.slow_call_duration_threshold;
        if self.state() == State::HalfOpen {
            let mut in_flight = self.half_open_probes_in_flight.lock();
            *in_flight = in_flight.saturating_sub(1);
        }
        if self.state() == State::HalfOpen && !success {
            info!("circuit breaker probe failed, reopening");
            self.trip();
            return;
        }
        let mut window = self.window.lock();
        if window.len() == self.config.window_size {
            window.pop_front();
        }
        window.push_back(Outcome { success, slow });
        if window.len() < self.config.window_size {
            return;
        }
        let failure_rate = window.iter().filter(|o| !o.success).count() as f64 / window.len() as f64;
        let slow_rate = window.iter().filter(|o| o.slow).count() as f64 / window.len() as f64;
        if failure_rate >= self.config.failure_rate_threshold
            || slow_rate >= self.config.slow_call_rate_threshold
        {
            drop(window);
            self.trip();
        } else if self.state() == State::HalfOpen {
            info!("circuit breaker probes healthy, closing");
            self.set_state(State::Closed);
            self.window.lock().clear();
        }
    }

    fn trip(&self) {
        self.set_state(State::Open);
        *self.opened_at.lock() = Some(Instant::now());
        self.window.lock().clear();
    }

    /// Classifies a fault as one the breaker should count against the
    /// backend's health. Codec faults and caller-side mistakes are not the
    /// backend's fault and must not trip the breaker.
    pub fn is_failure(fault: &CacheFault) -> bool {
        matches!(
            fault,
            CacheFault::TierReadFault(_) | CacheFault::TierWriteFault(_) | CacheFault::TierUnavailable(_)
        )
    }
}

/// Decorates any [`SharedTier`] with circuit-breaker protection. While open,
/// reads report a miss and writes/evicts are silent no-ops rather than
/// reaching the degraded backend.
pub struct CircuitBreakerTier<T: SharedTier> {
    inner: Arc<T>,
    breaker: CircuitBreaker,
}

impl<T: SharedTier> CircuitBreakerTier<T> {
    pub fn new(inner: Arc<T>, config: CircuitBreakerConfig) -> Self {
        Self {
            inner,
            breaker: CircuitBreaker::new(config),
        }
    }
}

fn outcome_of<V>(result: &Result<V, CacheFault>) -> bool {
    match result {
        Ok(_) => true,
        Err(fault) => !CircuitBreaker::is_failure(fault),
    }
}

#[async_trait]
impl<T: SharedTier> SharedTier for CircuitBreakerTier<T> {
    async fn get_bytes_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CacheFault> {
        if !self.breaker.allow_request() {
            tracing::debug!(key = %key, "circuit open, skipping shared tier read");
            return Ok(None);
        }
        let start = Instant::now();
        let result = self.inner.get_bytes_raw(key).await;
        self.breaker.record_outcome(outcome_of(&result), start.elapsed());
        result
    }

    async fn put_bytes(&self, key: &str, bytes: &[u8], ttl: Duration) -> Result<(), CacheFault> {
        if !self.breaker.allow_request() {
            tracing::debug!(key = %key, "circuit open, skipping shared tier write");
            return Ok(());
        }
        let start = Instant::now();
        let result = self.inner.put_bytes(key, bytes, ttl).await;
        self.breaker.record_outcome(outcome_of(&result), start.elapsed());
        result
    }

    async fn evict_raw(&self, key: &str) -> Result<(), CacheFault> {
        if !self.breaker.allow_request() {
            tracing::debug!(key = %key, "circuit open, skipping shared tier evict");
            return Ok(());
        }
        let start = Instant::now();
        let result = self.inner.evict_raw(key).await;
        self.breaker.record_outcome(outcome_of(&result), start.elapsed());
        result
    }

    async fn get_all_bytes_raw(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>, CacheFault> {
        if !self.breaker.allow_request() {
            tracing::debug!("circuit open, skipping shared tier batch read");
            return Ok(HashMap::new());
        }
        let start = Instant::now();
        let result = self.inner.get_all_bytes_raw(keys).await;
        self.breaker.record_outcome(outcome_of(&result), start.elapsed());
        result
    }

    async fn put_all_bytes(&self, items: Vec<(String, Vec<u8>)>, ttl: Duration) {
        if !self.breaker.allow_request() {
            tracing::debug!("circuit open, skipping shared tier batch write");
            return;
        }
        self.inner.put_all_bytes(items, ttl).await;
    }

    async fn evict_all(&self, keys: &[String]) {
        if !self.breaker.allow_request() {
            tracing::debug!("circuit open, skipping shared tier batch evict");
            return;
        }
        self.inner.evict_all(keys).await;
    }

    async fn scan_keys(&self, pattern: &str) -> anyhow::Result<Vec<String>> {
        if !self.breaker.allow_request() {
            tracing::debug!("circuit open, skipping shared tier scan");
            return Ok(Vec::new());
        }
        self.inner.scan_keys(pattern).await
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
