//! Gallery thumbnail pipeline
//!
//! Cache-first: the cache only ever holds the canonical rendition of a source
//! (see [`CANONICAL_PROFILE`]), keyed by path and profile. Whatever size the
//! caller asks for is derived from that rendition, so every requested size of
//! one cover shares a single cache entry.
//!
//! Flow per request:
//! 1. Empty path -> [`ThumbnailError::InvalidPath`]
//! 2. Cache hit -> output derived from the cached canonical bytes
//! 3. Miss -> fetch source, center-crop to canonical, store in the background
//! 4. Output derived from the canonical bytes
//!
//! Cache failures are logged and treated as misses; they never fail a request.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use nview_cache::{CacheKey, CacheLookup, CanonicalProfile, ThumbnailCache, CANONICAL_PROFILE};
use nview_render::{
    app_blob_url, probe_dimensions, ByteFetcher, EncodeTarget, FetchError, FetchOptions, ImageCodec, MimeType,
    RasterCodec, ResourceHandle, ResourceHost,
};
use tokio::runtime::Handle;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::metrics::MetricsSink;

/// Default ceiling for measured thumbnail cells
pub const DEFAULT_MAX_OUTPUT_SIZE: (u32, u32) = (610, 813);

/// One thumbnail request
#[derive(Debug, Clone, Default)]
pub struct ThumbnailRequest {
    pub file_path: String,
    pub target_width: Option<u32>,
    pub target_height: Option<u32>,

    /// Output MIME type; unknown types fall back to the canonical one
    pub mime_type: Option<String>,
    pub quality: Option<u8>,

    /// Return the canonical rendition whatever size was requested
    pub prefer_canonical_output: bool,
    pub cancel: Option<CancellationToken>,
}

impl ThumbnailRequest {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self { file_path: file_path.into(), ..Self::default() }
    }

    pub fn with_target_size(mut self, width: u32, height: u32) -> Self {
        self.target_width = Some(width);
        self.target_height = Some(height);
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn prefer_canonical(mut self) -> Self {
        self.prefer_canonical_output = true;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// A produced thumbnail
#[derive(Debug)]
pub struct ThumbnailOutput {
    /// Resource holding the output bytes; release it when the cell goes away
    pub object_url: ResourceHandle,
    pub from_cache: bool,
    pub mime_type: String,
    pub byte_len: usize,
}

/// Thumbnail request failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThumbnailError {
    #[error("thumbnail request has no file path")]
    InvalidPath,

    #[error("network error: {0}")]
    Network(#[source] FetchError),

    #[error("http status {status}")]
    Http { status: u16 },
}

impl ThumbnailError {
    /// Stable error kind for UI layers
    pub fn kind(&self) -> &'static str {
        match self {
            ThumbnailError::InvalidPath => "invalid_path",
            ThumbnailError::Network(_) => "network_error",
            ThumbnailError::Http { .. } => "http_error",
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ThumbnailError::Http { status } => Some(*status),
            _ => None,
        }
    }
}

/// Pixel size for a measured cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,

    /// False when the cell had no layout box yet
    pub has_measured_size: bool,
}

/// Convert a cell box in CSS pixels to a thumbnail target in device pixels
///
/// The pixel ratio is clamped to `1..=2` and each side to `1..=max`.
///
/// # Example
///
/// ```
/// use nview_core::compute_target_size;
///
/// let size = compute_target_size(180.0, 240.0, 3.0, (610, 813));
/// assert_eq!((size.width, size.height), (360, 480));
/// assert!(size.has_measured_size);
/// ```
pub fn compute_target_size(width: f64, height: f64, device_pixel_ratio: f64, max: (u32, u32)) -> TargetSize {
    let finite = |value: f64| if value.is_finite() { value.max(0.0) } else { 0.0 };
    let (width, height) = (finite(width), finite(height));
    let dpr = if device_pixel_ratio.is_finite() { device_pixel_ratio.clamp(1.0, 2.0) } else { 1.0 };
    let side = |value: f64, limit: u32| ((value * dpr).round() as u32).clamp(1, limit.max(1));

    TargetSize {
        width: side(width, max.0),
        height: side(height, max.1),
        has_measured_size: width > 0.0 && height > 0.0,
    }
}

/// Cache-first thumbnail generator
pub struct ThumbnailPipeline<F, C = RasterCodec> {
    fetcher: F,
    codec: C,
    host: Arc<dyn ResourceHost>,
    cache: Option<Arc<dyn ThumbnailCache>>,
    metrics: Arc<MetricsSink>,
    profile: CanonicalProfile,
    pending_stores: Mutex<JoinSet<()>>,
}

impl<F: ByteFetcher> ThumbnailPipeline<F> {
    /// Pipeline without a cache, using the software codec
    pub fn new(fetcher: F, host: Arc<dyn ResourceHost>) -> Self {
        Self {
            fetcher,
            codec: RasterCodec::new(),
            host,
            cache: None,
            metrics: Arc::new(MetricsSink::new()),
            profile: CANONICAL_PROFILE,
            pending_stores: Mutex::new(JoinSet::new()),
        }
    }
}

impl<F: ByteFetcher, C: ImageCodec> ThumbnailPipeline<F, C> {
    /// Swap the image codec
    pub fn with_codec<D: ImageCodec>(self, codec: D) -> ThumbnailPipeline<F, D> {
        ThumbnailPipeline {
            fetcher: self.fetcher,
            codec,
            host: self.host,
            cache: self.cache,
            metrics: self.metrics,
            profile: self.profile,
            pending_stores: self.pending_stores,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn ThumbnailCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Report into a shared sink
    pub fn with_metrics(mut self, metrics: Arc<MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<MetricsSink> {
        &self.metrics
    }

    /// Cache key for `file_path`; independent of any requested output
    pub fn cache_key(&self, file_path: &str) -> CacheKey {
        self.profile.key_for(file_path)
    }

    fn canonical_target(&self) -> EncodeTarget {
        EncodeTarget {
            width: self.profile.width,
            height: self.profile.height,
            mime_type: MimeType::parse(self.profile.mime_type).unwrap_or(MimeType::Jpeg),
            quality: self.profile.quality,
        }
    }

    fn output_target(&self, request: &ThumbnailRequest) -> EncodeTarget {
        let canonical = self.canonical_target();
        EncodeTarget {
            width: request.target_width.filter(|width| *width > 0).unwrap_or(canonical.width),
            height: request.target_height.filter(|height| *height > 0).unwrap_or(canonical.height),
            mime_type: request.mime_type.as_deref().and_then(MimeType::parse).unwrap_or(canonical.mime_type),
            quality: request.quality.map_or(canonical.quality, |quality| quality.clamp(1, 100)),
        }
    }

    /// Produce a thumbnail for `request`
    pub async fn fetch_thumbnail(&self, request: ThumbnailRequest) -> Result<ThumbnailOutput, ThumbnailError> {
        self.metrics.record_request();
        if request.file_path.trim().is_empty() {
            return Err(ThumbnailError::InvalidPath);
        }

        let key = self.cache_key(&request.file_path);
        if let Some((bytes, mime_type)) = self.read_cache(&key).await {
            self.metrics.record_cache_hit();
            return Ok(self.publish(bytes, mime_type, &request, true));
        }
        self.metrics.record_cache_miss();

        self.metrics.record_source_fetch();
        let options = FetchOptions::app_blob(request.cancel.clone());
        let response =
            self.fetcher.fetch(&app_blob_url(&request.file_path), &options).await.map_err(ThumbnailError::Network)?;
        if !response.is_success() {
            return Err(ThumbnailError::Http { status: response.status });
        }

        let target = self.canonical_target();
        let started = Instant::now();
        match self.codec.center_crop(&response.body, &target) {
            Ok(canonical) => {
                self.metrics.record_generated(started.elapsed());
                self.store(key, canonical.clone());
                Ok(self.publish(canonical, target.mime_type, &request, false))
            }
            Err(error) => {
                tracing::debug!(path = %request.file_path, %error, "thumbnail decode failed; using source bytes");
                let mime_type = probe_dimensions(&response.body).map_or(target.mime_type.as_str(), |meta| meta.mime_type);
                Ok(self.create_output(response.body, mime_type, false))
            }
        }
    }

    /// Canonical bytes from the cache, or `None` on a miss or any cache failure
    async fn read_cache(&self, key: &CacheKey) -> Option<(Vec<u8>, MimeType)> {
        let cache = self.cache.as_ref()?;
        match cache.get(key).await {
            Ok(CacheLookup::Hit { bytes, .. }) if bytes.is_empty() => {
                tracing::warn!(%key, "empty cached thumbnail; refetching");
                None
            }
            Ok(CacheLookup::Hit { bytes, mime_type }) => {
                let mime_type = MimeType::parse(&mime_type).unwrap_or(self.canonical_target().mime_type);
                Some((bytes, mime_type))
            }
            Ok(CacheLookup::Miss) => None,
            Err(error) => {
                tracing::warn!(%key, %error, "thumbnail cache read failed");
                None
            }
        }
    }

    /// Best-effort background store of canonical bytes
    fn store(&self, key: CacheKey, bytes: Vec<u8>) {
        let Some(cache) = self.cache.clone() else { return };
        let Ok(runtime) = Handle::try_current() else {
            tracing::debug!(%key, "no runtime; thumbnail not cached");
            return;
        };

        let mut pending = self.lock_pending();
        while pending.try_join_next().is_some() {}
        pending.spawn_on(
            async move {
                if let Err(error) = cache.put(key.clone(), bytes).await {
                    tracing::warn!(%key, %error, "thumbnail cache write failed");
                }
            },
            &runtime,
        );
    }

    /// Derive the caller's output from canonical bytes
    fn publish(
        &self,
        canonical: Vec<u8>,
        canonical_mime: MimeType,
        request: &ThumbnailRequest,
        from_cache: bool,
    ) -> ThumbnailOutput {
        let output = self.output_target(request);
        if request.prefer_canonical_output || output == self.canonical_target() {
            return self.create_output(canonical, canonical_mime.as_str(), from_cache);
        }

        match self.codec.center_crop(&canonical, &output) {
            Ok(bytes) => {
                self.metrics.record_output_transform();
                self.create_output(bytes, output.mime_type.as_str(), from_cache)
            }
            Err(error) => {
                tracing::debug!(%error, "output transform failed; returning canonical bytes");
                self.create_output(canonical, canonical_mime.as_str(), from_cache)
            }
        }
    }

    fn create_output(&self, bytes: Vec<u8>, mime_type: &str, from_cache: bool) -> ThumbnailOutput {
        let byte_len = bytes.len();
        let object_url = self.host.create_resource(bytes, mime_type);
        ThumbnailOutput { object_url, from_cache, mime_type: mime_type.to_string(), byte_len }
    }

    fn lock_pending(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.pending_stores.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for background cache stores issued so far
    pub async fn flush_pending_stores(&self) {
        let mut pending = std::mem::take(&mut *self.lock_pending());
        while let Some(joined) = pending.join_next().await {
            if let Err(error) = joined {
                tracing::warn!(%error, "thumbnail cache store task failed");
            }
        }
    }
}
