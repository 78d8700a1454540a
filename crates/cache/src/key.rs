//! Content-addressed thumbnail cache keys
//!
//! A key is derived from the source path and the canonical profile only. The
//! size, format, or quality a caller asks for never reaches the key, so every
//! requested rendition of one source shares a single cache entry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The single rendition that is stored in the thumbnail cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanonicalProfile {
    /// Profile version; bumping it invalidates every stored entry
    pub version: &'static str,

    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Encoded MIME type
    pub mime_type: &'static str,

    /// Encoder quality in percent
    pub quality: u8,
}

/// Canonical thumbnail profile: 384x512 JPEG at quality 85
pub const CANONICAL_PROFILE: CanonicalProfile = CanonicalProfile {
    version: "thumb_v2",
    width: 384,
    height: 512,
    mime_type: "image/jpeg",
    quality: 85,
};

impl CanonicalProfile {
    /// Build the cache key for `source_path` under this profile
    pub fn key_for(&self, source_path: impl Into<String>) -> CacheKey {
        CacheKey {
            source_path: source_path.into(),
            version: self.version.to_string(),
            width: self.width,
            height: self.height,
            mime_type: self.mime_type.to_string(),
            quality: self.quality,
        }
    }
}

impl Default for CanonicalProfile {
    fn default() -> Self {
        CANONICAL_PROFILE
    }
}

/// Key identifying one stored thumbnail
///
/// Serializes with camelCase field names, matching the payload shape external
/// cache stores receive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheKey {
    /// Source image path exactly as the caller supplied it
    pub source_path: String,

    /// Canonical profile version
    pub version: String,

    /// Canonical width in pixels
    pub width: u32,

    /// Canonical height in pixels
    pub height: u32,

    /// Canonical MIME type
    pub mime_type: String,

    /// Canonical quality in percent
    pub quality: u8,
}

impl CacheKey {
    /// Key for `source_path` under [`CANONICAL_PROFILE`]
    ///
    /// # Example
    ///
    /// ```
    /// use nview_cache::CacheKey;
    ///
    /// let a = CacheKey::canonical("covers/one.jpg");
    /// let b = CacheKey::canonical("covers/one.jpg");
    /// assert_eq!(a, b);
    /// assert_eq!((a.width, a.height), (384, 512));
    /// ```
    pub fn canonical(source_path: impl Into<String>) -> Self {
        CANONICAL_PROFILE.key_for(source_path)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}:{}x{}:{}:q{}",
            self.source_path, self.version, self.width, self.height, self.mime_type, self.quality
        )
    }
}
