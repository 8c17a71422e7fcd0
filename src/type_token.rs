//! Runtime type identity for values stored natively in the local tier.
//!
//! Rust generics are monomorphized, so [`std::any::TypeId`] already encodes
//! a fully reified type — `TypeToken::of::<Vec<User>>()` and
//! `TypeToken::of::<Vec<Product>>()` are distinct tokens with no shared
//! "raw class". A lookup either matches exactly or is treated as a miss;
//! there is no partial/erased-generic case to reason about.

use std::any::{Any, TypeId};

/// Identifies the concrete type a value was stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeToken {
    id: TypeId,
    name: &'static str,
}

impl TypeToken {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Short type name for metric tags and diagnostics; not guaranteed stable
    /// across compiler versions, never used for equality.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn matches(&self, value: &(dyn Any + Send + Sync)) -> bool {
        value.type_id() == self.id
    }
}

/// The sentinel stored in place of a real value to record "the loader
/// confirmed there is nothing at this key" — distinct from "never cached".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsentMarker;
