//! Per-page residency state
//!
//! A [`PageState`] moves through `Idle -> Loading -> {Loaded, Error}`, with
//! `Loaded -> Evicted` when its resource is released and `Loading -> Idle` on
//! abort. The owned [`ResourceHandle`] is present exactly while the page is
//! `Loaded`; the abort token is present exactly while it is `Loading`.

use nview_render::{to_safe_dimension, ResourceHandle};
use nview_scheduler::{CancellationToken, Millis, PageStatus, ResidencyView, SessionToken};
use serde::{Deserialize, Serialize};

/// One entry of the ordered page list handed to the reader
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDescriptor {
    /// Source path; an empty path marks a malformed entry
    #[serde(default)]
    pub path: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Natural width pre-extracted from an index, if known
    #[serde(default, alias = "width", skip_serializing_if = "Option::is_none")]
    pub natural_width: Option<u32>,

    /// Natural height pre-extracted from an index, if known
    #[serde(default, alias = "height", skip_serializing_if = "Option::is_none")]
    pub natural_height: Option<u32>,
}

impl PageDescriptor {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self { path: path.into(), name: name.into(), natural_width: None, natural_height: None }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.natural_width = Some(width);
        self.natural_height = Some(height);
        self
    }

    /// Whether the entry carries a usable path
    pub fn has_path(&self) -> bool {
        !self.path.trim().is_empty()
    }

    /// Both dimensions, when present and inside the accepted range
    pub fn known_dimensions(&self) -> Option<(u32, u32)> {
        let width = to_safe_dimension(f64::from(self.natural_width?))?;
        let height = to_safe_dimension(f64::from(self.natural_height?))?;
        Some((width, height))
    }
}

/// Illegal lifecycle transition
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("page {index}: cannot move from {from} to {to}")]
    InvalidTransition { index: usize, from: PageStatus, to: PageStatus },
}

/// A resource that could not be attached, handed back for release
#[derive(Debug)]
pub struct RejectedResource {
    pub error: TransitionError,
    pub handle: ResourceHandle,
}

/// Lifecycle state of one page within a reader session
#[derive(Debug)]
pub struct PageState {
    index: usize,
    status: PageStatus,
    natural_size: Option<(u32, u32)>,
    resource: Option<ResourceHandle>,
    last_visible_at: Millis,
    abort: Option<CancellationToken>,
    load_id: Option<u64>,
    session: Option<SessionToken>,
}

impl PageState {
    /// Idle state seeded at `now`
    pub fn new(index: usize, natural_size: Option<(u32, u32)>, now: Millis) -> Self {
        Self {
            index,
            status: PageStatus::Idle,
            natural_size,
            resource: None,
            last_visible_at: now,
            abort: None,
            load_id: None,
            session: None,
        }
    }

    fn invalid(&self, to: PageStatus) -> TransitionError {
        TransitionError::InvalidTransition { index: self.index, from: self.status, to }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn status(&self) -> PageStatus {
        self.status
    }

    pub fn natural_size(&self) -> Option<(u32, u32)> {
        self.natural_size
    }

    pub fn resource(&self) -> Option<&ResourceHandle> {
        self.resource.as_ref()
    }

    pub fn last_visible_at(&self) -> Millis {
        self.last_visible_at
    }

    /// Session captured when the current load was issued
    pub fn load_session(&self) -> Option<SessionToken> {
        self.session
    }

    pub fn has_abort_handle(&self) -> bool {
        self.abort.is_some()
    }

    /// Whether the page is loading and waiting on exactly `load_id`
    pub fn is_awaiting(&self, load_id: u64) -> bool {
        self.status == PageStatus::Loading && self.load_id == Some(load_id)
    }

    /// Refresh the last-visible timestamp
    pub fn touch(&mut self, now: Millis) {
        self.last_visible_at = self.last_visible_at.max(now);
    }

    /// `Idle | Evicted -> Loading`
    pub fn begin_load(
        &mut self,
        abort: CancellationToken,
        session: SessionToken,
        load_id: u64,
    ) -> Result<(), TransitionError> {
        if !self.status.is_load_eligible() {
            return Err(self.invalid(PageStatus::Loading));
        }
        self.status = PageStatus::Loading;
        self.abort = Some(abort);
        self.load_id = Some(load_id);
        self.session = Some(session);
        Ok(())
    }

    /// `Loading -> Loaded`, taking ownership of `handle`
    ///
    /// Natural dimensions are recorded only when not already known.
    pub fn attach(
        &mut self,
        handle: ResourceHandle,
        natural_size: Option<(u32, u32)>,
        now: Millis,
    ) -> Result<(), RejectedResource> {
        if self.status != PageStatus::Loading {
            return Err(RejectedResource { error: self.invalid(PageStatus::Loaded), handle });
        }
        self.finish_load();
        self.status = PageStatus::Loaded;
        self.resource = Some(handle);
        if self.natural_size.is_none() {
            self.natural_size = natural_size;
        }
        self.touch(now);
        Ok(())
    }

    /// `Loading -> Error`
    pub fn mark_failed(&mut self) -> Result<(), TransitionError> {
        if self.status != PageStatus::Loading {
            return Err(self.invalid(PageStatus::Error));
        }
        self.finish_load();
        self.status = PageStatus::Error;
        Ok(())
    }

    /// `Loading -> Idle`, signalling the abort token
    ///
    /// Returns false when the page was not loading.
    pub fn abort(&mut self) -> bool {
        if self.status != PageStatus::Loading {
            return false;
        }
        if let Some(token) = self.abort.take() {
            token.cancel();
        }
        self.finish_load();
        self.status = PageStatus::Idle;
        true
    }

    /// `Loaded -> Evicted`, handing back the resource for release
    ///
    /// Evicted stands in for Idle: it schedules and loads exactly like Idle and
    /// only records that the page was resident before. A no-op for any other
    /// status.
    pub fn evict(&mut self) -> Option<ResourceHandle> {
        if self.status != PageStatus::Loaded {
            return None;
        }
        self.status = PageStatus::Evicted;
        self.resource.take()
    }

    /// `Error -> Idle`, making the page eligible for one more attempt
    pub fn reset_error(&mut self) -> bool {
        if self.status != PageStatus::Error {
            return false;
        }
        self.status = PageStatus::Idle;
        true
    }

    /// `Idle -> Error` for a page that cannot be fetched at all
    pub fn fail_without_load(&mut self) -> bool {
        if self.status != PageStatus::Idle {
            return false;
        }
        self.status = PageStatus::Error;
        true
    }

    /// Drop everything regardless of status, returning the resource if any
    pub fn release_all(&mut self) -> Option<ResourceHandle> {
        if let Some(token) = self.abort.take() {
            token.cancel();
        }
        self.finish_load();
        self.status = PageStatus::Idle;
        self.resource.take()
    }

    fn finish_load(&mut self) {
        self.abort = None;
        self.load_id = None;
        self.session = None;
    }
}

impl ResidencyView for PageState {
    fn page_index(&self) -> usize {
        self.index
    }

    fn status(&self) -> PageStatus {
        self.status
    }

    fn last_visible_at(&self) -> Millis {
        self.last_visible_at
    }
}
