//! Fault taxonomy for the cache engine.
//!
//! Only [`CacheLoadingFault`] crosses into application code. Every other
//! variant is caught and downgraded (to a miss, or a logged-and-swallowed
//! write failure) inside the tier that produced it.

use thiserror::Error;

/// A fault raised by a tier implementation or the codec.
#[derive(Debug, Error)]
pub enum CacheFault {
    #[error("tier read failed: {0}")]
    TierReadFault(String),

    #[error("tier write failed: {0}")]
    TierWriteFault(String),

    #[error("shared tier unavailable: {0}")]
    TierUnavailable(String),

    #[error("codec fault: {0}")]
    CodecFault(String),
}

/// The only fault that reaches a caller of [`crate::core_engine::CoreEngine`].
///
/// Wraps either a loader failure or a cooperative cancellation of the
/// awaiting task.
#[derive(Debug, Error, Clone)]
pub enum CacheLoadingFault {
    #[error("loader failed: {0}")]
    LoaderFault(std::sync::Arc<anyhow::Error>),

    #[error("loader was cancelled before it produced a result")]
    Interrupted,
}

impl CacheLoadingFault {
    pub fn from_loader_error(err: anyhow::Error) -> Self {
        Self::LoaderFault(std::sync::Arc::new(err))
    }
}
