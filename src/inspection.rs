//! Read-only operational view over a running engine: status, probe, and a
//! thin pass-through to invalidation. Intended to back an operator-facing
//! HTTP/CLI surface this crate does not itself expose.

use crate::codec::CacheCodec;
use crate::core_engine::CoreEngine;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum TierState {
    Enabled,
    Disabled,
}

#[derive(Debug, Serialize, Clone, Copy)]
pub struct InspectionStatus {
    pub local: TierState,
    pub shared: TierState,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum FoundIn {
    Local,
    Shared,
    Neither,
}

#[derive(Debug, Serialize, Clone)]
pub struct ProbeResult {
    pub key: String,
    pub found_in: FoundIn,
    /// The stored value's runtime type name, when it can be recovered
    /// without the caller supplying a type to check against. Only the local
    /// tier exposes this (via `LocalTier::peek_type`); a key found only on
    /// the shared tier carries `None`, since its bytes are opaque without a
    /// type to decode them against.
    pub value_type: Option<&'static str>,
}

#[derive(Debug, Serialize, Clone)]
pub struct EvictResponse {
    pub key: String,
    pub scheduled: bool,
}

/// Constructed from a live engine; never mutates what it inspects beyond
/// the explicit `evict` call, which itself only schedules work on the
/// engine's own scheduler.
pub struct Inspector<C: CacheCodec + 'static> {
    engine: Arc<CoreEngine<C>>,
    local_enabled: bool,
    shared_enabled: bool,
}

impl<C: CacheCodec + 'static> Inspector<C> {
    pub fn new(engine: Arc<CoreEngine<C>>, local_enabled: bool, shared_enabled: bool) -> Self {
        Self {
            engine,
            local_enabled,
            shared_enabled,
        }
    }

    pub fn status(&self) -> InspectionStatus {
        InspectionStatus {
            local: if self.local_enabled { TierState::Enabled } else { TierState::Disabled },
            shared: if self.shared_enabled { TierState::Enabled } else { TierState::Disabled },
        }
    }

    /// Looks for `key` without promoting or populating anything, unlike
    /// `get_or_load`.
    pub async fn probe(&self, key: &str) -> ProbeResult {
        let (found_in, value_type) = self.engine.probe_presence(key).await;
        ProbeResult {
            key: key.to_string(),
            found_in,
            value_type,
        }
    }

    pub async fn evict(&self, key: &str) -> EvictResponse {
        self.engine.invalidate(key).await;
        EvictResponse {
            key: key.to_string(),
            scheduled: true,
        }
    }
}
