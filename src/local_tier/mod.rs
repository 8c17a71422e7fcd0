//! The fast, in-process tier. Stores values natively (no serialization) and
//! type-checks every read against the caller's expected type.

#[cfg(feature = "moka")]
mod moka_tier;
mod dashmap_tier;

#[cfg(feature = "moka")]
pub use moka_tier::{MokaLocalTier, MokaLocalTierConfig};
pub use dashmap_tier::DashMapLocalTier;

use crate::type_token::TypeToken;
use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Result of a native, type-checked local lookup.
///
/// A stored value whose `TypeId` no longer matches the caller's requested
/// type is treated as `Miss`, never surfaced as a distinct "type mismatch"
/// error — a caller that changed the type it stores under a key should not
/// observe anything stranger than a cache miss.
pub enum LocalLookup {
    Hit(Arc<dyn Any + Send + Sync>),
    /// A confirmed negative result was cached at this key.
    Absent,
    Miss,
}

#[async_trait]
pub trait LocalTier: Send + Sync {
    async fn get(&self, key: &str, token: TypeToken) -> LocalLookup;
    async fn put(&self, key: &str, token: TypeToken, value: Arc<dyn Any + Send + Sync>);
    async fn put_absent(&self, key: &str);
    async fn evict(&self, key: &str);

    /// Whether any entry (value or absent marker) is stored at `key`,
    /// regardless of its type. Used by the inspection shim, which reports
    /// presence without needing to know the caller's expected type.
    async fn contains(&self, key: &str) -> bool;

    /// The runtime type name a value was `put` under, if `key` currently
    /// holds one (an absent marker has no type). Used by the inspection
    /// shim to answer "what's cached here" without the caller supplying a
    /// type to check against, the way `get` requires.
    async fn peek_type(&self, key: &str) -> Option<&'static str>;

    /// Batch lookup. Omits keys that missed entirely; a key found as a
    /// confirmed-absent marker is still reported (as [`LocalLookup::Absent`])
    /// rather than silently dropped, so a caller can't mistake "confirmed
    /// nothing here" for "never looked up".
    async fn get_all(&self, keys: &[String], token: TypeToken) -> HashMap<String, LocalLookup> {
        let mut out = HashMap::with_capacity(keys.len());
        for key in keys {
            match self.get(key, token).await {
                LocalLookup::Miss => {}
                found => {
                    out.insert(key.clone(), found);
                }
            }
        }
        out
    }

    async fn put_all(&self, items: Vec<(String, TypeToken, Arc<dyn Any + Send + Sync>)>) {
        for (key, token, value) in items {
            self.put(&key, token, value).await;
        }
    }

    async fn evict_all(&self, keys: &[String]) {
        for key in keys {
            self.evict(key).await;
        }
    }

    fn name(&self) -> &'static str;
}
