//! Renderable resource host
//!
//! A resource is an addressable in-memory blob (the equivalent of an object
//! URL). Handles are not `Clone`: whoever holds one owns the resource and must
//! give it back through [`ResourceHost::release_resource`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Owning handle to a live renderable resource
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    url: String,
}

impl ResourceHandle {
    /// Wrap a resource URL minted by a host
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Address the renderer uses as the image source
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Creates and releases renderable resources
pub trait ResourceHost: Send + Sync {
    /// Publish `bytes` as a new resource
    fn create_resource(&self, bytes: Vec<u8>, mime_type: &str) -> ResourceHandle;

    /// Release a resource; the handle is consumed
    fn release_resource(&self, handle: ResourceHandle);
}

#[derive(Debug)]
struct Blob {
    bytes: Vec<u8>,
    mime_type: String,
}

#[derive(Debug, Default)]
struct BlobState {
    next_id: u64,
    live: HashMap<String, Blob>,
    revoked: Vec<String>,
}

/// In-process [`ResourceHost`] that keeps blobs in memory
///
/// Tracks every URL it revokes so leaks and double releases are observable.
///
/// # Example
///
/// ```
/// use nview_render::{BlobStore, ResourceHost};
///
/// let store = BlobStore::new();
/// let handle = store.create_resource(vec![1, 2, 3], "image/png");
/// assert_eq!(handle.url(), "blob:nview/1");
///
/// store.release_resource(handle);
/// assert_eq!(store.live_count(), 0);
/// assert_eq!(store.revoked(), vec!["blob:nview/1".to_string()]);
/// ```
#[derive(Debug, Default)]
pub struct BlobStore {
    state: Mutex<BlobState>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BlobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bytes behind a live resource
    pub fn bytes(&self, handle: &ResourceHandle) -> Option<Vec<u8>> {
        self.lock().live.get(handle.url()).map(|blob| blob.bytes.clone())
    }

    /// MIME type of a live resource
    pub fn mime_type(&self, handle: &ResourceHandle) -> Option<String> {
        self.lock().live.get(handle.url()).map(|blob| blob.mime_type.clone())
    }

    /// Whether `url` names a live resource
    pub fn is_live(&self, url: &str) -> bool {
        self.lock().live.contains_key(url)
    }

    /// Number of live resources
    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    /// Number of resources created so far
    pub fn created_count(&self) -> u64 {
        self.lock().next_id
    }

    /// URLs revoked so far, in release order
    pub fn revoked(&self) -> Vec<String> {
        self.lock().revoked.clone()
    }
}

impl ResourceHost for BlobStore {
    fn create_resource(&self, bytes: Vec<u8>, mime_type: &str) -> ResourceHandle {
        let mut state = self.lock();
        state.next_id += 1;
        let url = format!("blob:nview/{}", state.next_id);
        state.live.insert(url.clone(), Blob { bytes, mime_type: mime_type.to_string() });
        ResourceHandle::new(url)
    }

    fn release_resource(&self, handle: ResourceHandle) {
        let mut state = self.lock();
        if state.live.remove(handle.url()).is_none() {
            tracing::warn!(url = %handle, "release of unknown resource");
            return;
        }
        state.revoked.push(handle.url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_unique_and_tracked() {
        let store = BlobStore::new();
        let a = store.create_resource(vec![1], "image/jpeg");
        let b = store.create_resource(vec![2], "image/png");

        assert_ne!(a, b);
        assert_eq!(store.live_count(), 2);
        assert_eq!(store.created_count(), 2);
        assert_eq!(store.bytes(&b), Some(vec![2]));
        assert_eq!(store.mime_type(&a).as_deref(), Some("image/jpeg"));
    }

    #[test]
    fn releasing_an_unknown_handle_is_ignored() {
        let store = BlobStore::new();
        let live = store.create_resource(vec![1], "image/jpeg");

        store.release_resource(ResourceHandle::new("blob:elsewhere/9"));
        assert!(store.is_live(live.url()));
        assert!(store.revoked().is_empty());

        let url = live.url().to_string();
        store.release_resource(live);
        assert!(!store.is_live(&url));
        assert_eq!(store.revoked(), vec![url]);
    }
}
