//! Byte-fetch capability and app-local URL mapping
//!
//! Local files are addressed through `appblob:///` URLs. Paths are normalized
//! before encoding: backslashes become forward slashes, a bare drive prefix
//! (`c/...`) becomes `C:/...`, and every segment is percent-encoded with the
//! exception of the drive colon.

use std::borrow::Cow;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tokio_util::sync::CancellationToken;

/// Scheme prefix of app-local URLs
pub const APP_BLOB_PREFIX: &str = "appblob:///";

/// Characters left unescaped in a path segment
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

fn is_drive_segment(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Normalize a platform path into forward-slash form with an upper-case drive
///
/// # Example
///
/// ```
/// use nview_render::normalize_path;
///
/// assert_eq!(normalize_path(r"c\Comics\vol 1.cbz"), "C:/Comics/vol 1.cbz");
/// assert_eq!(normalize_path("d:/x"), "D:/x");
/// assert_eq!(normalize_path("/home/me/a.jpg"), "/home/me/a.jpg");
/// ```
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let bytes = path.as_bytes();

    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b'/' {
        return format!("{}:/{}", char::from(bytes[0].to_ascii_uppercase()), &path[2..]);
    }
    if bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/' {
        return format!("{}{}", char::from(bytes[0].to_ascii_uppercase()), &path[1..]);
    }
    path
}

/// App-local URL for a file path
///
/// # Example
///
/// ```
/// use nview_render::app_blob_url;
///
/// assert_eq!(app_blob_url(r"C:\My Comics\#1.jpg"), "appblob:///C:/My%20Comics/%231.jpg");
/// ```
pub fn app_blob_url(path: &str) -> String {
    let normalized = normalize_path(path);
    let encoded: Vec<Cow<'_, str>> = normalized
        .split('/')
        .enumerate()
        .map(|(position, segment)| {
            if position == 0 && is_drive_segment(segment) {
                Cow::Borrowed(segment)
            } else {
                Cow::from(utf8_percent_encode(segment, SEGMENT))
            }
        })
        .collect();
    format!("{APP_BLOB_PREFIX}{}", encoded.join("/"))
}

/// Path addressed by an app-local URL
///
/// Returns `None` for other schemes or invalid UTF-8 escapes.
pub fn app_blob_path(url: &str) -> Option<PathBuf> {
    let encoded = url.strip_prefix(APP_BLOB_PREFIX)?;
    let decoded = percent_decode_str(encoded).decode_utf8().ok()?;
    Some(PathBuf::from(decoded.as_ref()))
}

/// HTTP cache mode; app-local fetches always bypass caches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    NoStore,
}

/// Credential mode; app-local fetches never send credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialsMode {
    #[default]
    Omit,
}

/// Options for one fetch
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub cache: CacheMode,
    pub credentials: CredentialsMode,

    /// Best-effort abort signal
    pub cancel: Option<CancellationToken>,
}

impl FetchOptions {
    /// The fixed options used for app-local fetches
    pub fn app_blob(cancel: Option<CancellationToken>) -> Self {
        Self { cache: CacheMode::NoStore, credentials: CredentialsMode::Omit, cancel }
    }

    /// Whether the abort signal has fired
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

/// Response to a fetch that reached the resource layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn ok(body: Vec<u8>) -> Self {
        Self { status: 200, body }
    }

    pub fn status(status: u16) -> Self {
        Self { status, body: Vec::new() }
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport-level fetch failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("request aborted")]
    Aborted,

    #[error("transport error: {0}")]
    Transport(String),
}

/// Fetches bytes for an app-local URL
pub trait ByteFetcher: Send + Sync {
    /// Fetch `url`; non-2xx statuses are responses, not errors
    fn fetch(&self, url: &str, options: &FetchOptions) -> impl Future<Output = Result<FetchResponse, FetchError>> + Send;
}

/// [`ByteFetcher`] that reads app-local URLs from the filesystem
///
/// Relative paths resolve against `root` when one is set.
#[derive(Debug, Clone, Default)]
pub struct FileFetcher {
    root: Option<PathBuf>,
}

impl FileFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: Some(root.into()) }
    }

    fn resolve(&self, path: PathBuf) -> PathBuf {
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path,
        }
    }

    async fn read(path: &Path) -> Result<FetchResponse, FetchError> {
        match tokio::fs::read(path).await {
            Ok(body) => Ok(FetchResponse::ok(body)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(FetchResponse::status(404)),
            Err(error) if error.kind() == ErrorKind::PermissionDenied => Ok(FetchResponse::status(403)),
            Err(error) => Err(FetchError::Transport(format!("{}: {error}", path.display()))),
        }
    }
}

impl ByteFetcher for FileFetcher {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchResponse, FetchError> {
        let path = app_blob_path(url).ok_or_else(|| FetchError::Transport(format!("unsupported url: {url}")))?;
        let path = self.resolve(path);

        let Some(cancel) = options.cancel.clone() else {
            return Self::read(&path).await;
        };
        if cancel.is_cancelled() {
            return Err(FetchError::Aborted);
        }

        tokio::select! {
            _ = cancel.cancelled() => Err(FetchError::Aborted),
            response = Self::read(&path) => response,
        }
    }
}
