//! nview render
//!
//! Platform primitives behind the page reader and the thumbnail pipeline:
//! image decode/crop/encode, renderable blob resources, app-local byte
//! fetching, and header-only dimension probing.

mod codec;
mod fetch;
mod probe;
mod resource;

pub use codec::{center_crop_rect, CodecError, CropRect, EncodeTarget, ImageCodec, MimeType, RasterCodec};
pub use fetch::{
    app_blob_path, app_blob_url, normalize_path, ByteFetcher, CacheMode, CredentialsMode, FetchError, FetchOptions,
    FetchResponse, FileFetcher, APP_BLOB_PREFIX,
};
pub use probe::{probe_dimensions, sanitize_page_name, to_safe_dimension, ImageMetadata, MAX_DIMENSION_PX, PAGE_NAME_MAX_LENGTH};
pub use resource::{BlobStore, ResourceHandle, ResourceHost};
