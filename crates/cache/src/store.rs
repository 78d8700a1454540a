//! Thumbnail cache capability
//!
//! The pipeline treats the cache as an optional, externally owned key/value
//! store. Implementations are used as trait objects, so their futures are
//! boxed.

use std::future::Future;
use std::pin::Pin;

use crate::key::CacheKey;

/// Boxed future returned by [`ThumbnailCache`] methods
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors a cache backend may report
///
/// The pipeline never surfaces these to its callers; they are logged and the
/// request falls back to the source fetch.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Backend is not reachable
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    /// Backend failed to read or write an entry
    #[error("cache backend error: {0}")]
    Backend(String),

    /// Stored entry could not be used
    #[error("corrupt cache entry: {0}")]
    Corrupt(String),
}

/// Outcome of a cache read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// Entry found
    Hit {
        /// Stored bytes
        bytes: Vec<u8>,

        /// MIME type reported by the store
        mime_type: String,
    },

    /// No entry for the key
    Miss,
}

impl CacheLookup {
    /// Whether this lookup found an entry
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit { .. })
    }
}

/// Key/value store for canonical thumbnail bytes
pub trait ThumbnailCache: Send + Sync {
    /// Look up the entry for `key`
    fn get(&self, key: &CacheKey) -> BoxFuture<'_, Result<CacheLookup, CacheError>>;

    /// Store `bytes` under `key`, replacing any existing entry
    fn put(&self, key: CacheKey, bytes: Vec<u8>) -> BoxFuture<'_, Result<(), CacheError>>;
}
