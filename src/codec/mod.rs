//! Serialization contract between native values and the bytes a shared tier
//! stores.

mod json;
#[cfg(feature = "postcard")]
mod postcard_codec;

pub use json::JsonCodec;
#[cfg(feature = "postcard")]
pub use postcard_codec::PostcardCodec;

use crate::error::CacheFault;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// Encodes/decodes values on the way in and out of a shared tier.
///
/// Implementations never see the absent-marker tag byte; that framing is
/// applied by the caller (`SharedTier` implementations), keeping this
/// contract limited to `T <-> bytes`.
pub trait CacheCodec: Send + Sync + Debug {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CacheFault>;
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CacheFault>;
    fn name(&self) -> &'static str;
}
