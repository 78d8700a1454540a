//! nview cache
//!
//! Content-addressed storage for canonical gallery thumbnails.
//!
//! Keys are built from the source path and the fixed canonical profile, the
//! [`ThumbnailCache`] trait is the capability the thumbnail pipeline consumes,
//! and [`RamThumbnailCache`] is an in-process LRU backend for it.

mod key;
mod ram;
mod store;

pub use key::{CacheKey, CanonicalProfile, CANONICAL_PROFILE};
pub use ram::{CacheStats, RamThumbnailCache};
pub use store::{BoxFuture, CacheError, CacheLookup, ThumbnailCache};
