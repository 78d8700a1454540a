//! Reader page controller
//!
//! Owns the per-page state of one reader session and decides which pages are
//! fetched, which stay resident and which are released. The controller is
//! synchronous: it hands out [`LoadTicket`]s for the host to run (see
//! [`crate::loader`]) and takes the results back through
//! [`ReaderPageController::complete_load`], which is the single place a load
//! result is checked against the live session before touching page state.
//!
//! Residency runs in this order on every update:
//! 1. Anchor = most visible page; aggressive mode if over the resident cap
//! 2. Hot and warm zones around the anchor; visible pages refresh their timestamp
//! 3. Loads that left the warm zone are aborted
//! 4. Hot candidates are queued, warm ones only while scrolling slowly
//! 5. Out-of-zone pages past hysteresis are evicted, oldest first
//! 6. The queue is flushed up to the in-flight cap

use std::sync::Arc;
use std::time::Duration;

use nview_render::{sanitize_page_name, ResourceHandle, ResourceHost};
use nview_scheduler::{
    compute_zones, should_abort_load, should_evict, CancellationToken, Clock, EvictionCaps, LoadJob, LoadPriority,
    LoadQueue, Millis, PageStatus, SessionGuard, SessionToken, Zones,
};
use serde::Serialize;

use crate::config::{EffectiveResidency, LayoutConfig, ResidencyConfig, AGGRESSIVE_MODE_MIN_MS};
use crate::layout::{FitMode, PageLayout, Viewport};
use crate::page::{PageDescriptor, PageState};

/// Why a page load failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadFailure {
    #[error("http status {status}")]
    Http { status: u16 },

    #[error("network error: {0}")]
    Network(String),

    #[error("image could not be decoded")]
    Decode,
}

/// Result of running a [`LoadTicket`]
#[derive(Debug)]
pub enum LoadOutcome {
    /// Bytes were fetched and published as a resource
    Loaded { resource: ResourceHandle, natural_size: Option<(u32, u32)> },

    /// The abort token fired before a resource was created
    Aborted,

    Failed(LoadFailure),
}

/// A page load issued by the controller
#[derive(Debug, Clone)]
pub struct LoadTicket {
    pub index: usize,
    pub path: String,
    pub session: SessionToken,
    pub load_id: u64,

    /// Fires when the load is aborted or the session ends
    pub cancel: CancellationToken,
}

impl LoadTicket {
    /// Pair this ticket with its outcome
    pub fn complete(self, outcome: LoadOutcome) -> LoadCompletion {
        LoadCompletion { index: self.index, session: self.session, load_id: self.load_id, outcome }
    }
}

/// A settled load, as handed back to the controller
#[derive(Debug)]
pub struct LoadCompletion {
    pub index: usize,
    pub session: SessionToken,
    pub load_id: u64,
    pub outcome: LoadOutcome,
}

/// Scroll easing requested from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollBehavior {
    #[default]
    Auto,
    Smooth,
}

impl ScrollBehavior {
    pub fn as_str(self) -> &'static str {
        match self {
            ScrollBehavior::Auto => "auto",
            ScrollBehavior::Smooth => "smooth",
        }
    }
}

/// Scroll the host should perform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollCommand {
    pub top: f64,
    pub behavior: ScrollBehavior,
}

/// Counters for one controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderStats {
    pub loads_started: u64,
    pub loads_completed: u64,
    pub loads_failed: u64,
    pub loads_aborted: u64,
    pub stale_completions: u64,
    pub evictions: u64,
    pub resources_released: u64,
    pub aggressive_entries: u64,
    pub memory_pressure_hints: u64,
}

/// Windowed page residency for a scroll-driven reader
pub struct ReaderPageController {
    residency: ResidencyConfig,
    layout_config: LayoutConfig,
    clock: Arc<dyn Clock>,
    host: Arc<dyn ResourceHost>,
    session: SessionGuard,
    is_open: bool,

    descriptors: Vec<PageDescriptor>,
    pages: Vec<PageState>,
    queue: LoadQueue,
    outbox: Vec<LoadTicket>,
    next_load_id: u64,

    viewport: Viewport,
    fit_mode: FitMode,
    layout: PageLayout,
    anchor: usize,
    zones: Zones,

    aggressive_until: Millis,
    scroll_sample: Option<(f64, Millis)>,
    scroll_velocity: f64,
    stats: ReaderStats,
}

impl ReaderPageController {
    /// Create a closed controller with default configuration
    pub fn new(host: Arc<dyn ResourceHost>, clock: Arc<dyn Clock>) -> Self {
        Self {
            residency: ResidencyConfig::default(),
            layout_config: LayoutConfig::default(),
            clock,
            host,
            session: SessionGuard::new(),
            is_open: false,
            descriptors: Vec::new(),
            pages: Vec::new(),
            queue: LoadQueue::new(),
            outbox: Vec::new(),
            next_load_id: 0,
            viewport: Viewport::default(),
            fit_mode: FitMode::default(),
            layout: PageLayout::default(),
            anchor: 0,
            zones: Zones::empty(),
            aggressive_until: 0,
            scroll_sample: None,
            scroll_velocity: 0.0,
            stats: ReaderStats::default(),
        }
    }

    pub fn with_residency(mut self, config: ResidencyConfig) -> Self {
        self.residency = config.normalized();
        self
    }

    pub fn with_layout(mut self, config: LayoutConfig) -> Self {
        self.layout_config = config;
        self
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    /// Replace the page set and start a new session
    ///
    /// Every resource of the previous session is released and its pending
    /// loads are cancelled; their completions will be discarded.
    pub fn open(&mut self, pages: Vec<PageDescriptor>, initial_anchor: Option<usize>) -> SessionToken {
        self.release_all();
        let session = self.session.begin();
        let now = self.clock.now_ms();

        self.pages = pages
            .iter()
            .enumerate()
            .map(|(index, descriptor)| PageState::new(index, descriptor.known_dimensions(), now))
            .collect();
        for (page, descriptor) in self.pages.iter_mut().zip(&pages) {
            if !descriptor.has_path() {
                page.fail_without_load();
                tracing::debug!(index = page.index(), "page has no path");
            }
        }
        self.descriptors = pages;
        self.is_open = true;
        self.rebuild_layout();

        let anchor = initial_anchor.unwrap_or(0).min(self.pages.len().saturating_sub(1));
        let target = self.layout.scroll_target(anchor).unwrap_or(0.0);
        self.viewport.scroll_top = target.min(self.layout.max_scroll_top(&self.viewport));
        tracing::info!(session = %session, pages = self.pages.len(), anchor, "reader opened");

        if self.pages.is_empty() {
            return session;
        }

        if !self.residency.enabled {
            for index in 0..self.pages.len() {
                self.queue.push(LoadJob::new(index, anchor, LoadPriority::Hot));
            }
        }
        self.apply_residency(anchor);
        session
    }

    /// Release every resource and invalidate the session; idempotent
    pub fn close(&mut self) {
        let released = self.release_all();
        if self.is_open {
            let session = self.session.invalidate();
            tracing::info!(session = %session, released, "reader closed");
        }
        self.is_open = false;
    }

    fn release_all(&mut self) -> usize {
        let mut released = 0;
        for page in &mut self.pages {
            if let Some(handle) = page.release_all() {
                self.host.release_resource(handle);
                released += 1;
            }
        }
        self.stats.resources_released += released as u64;

        self.pages.clear();
        self.descriptors.clear();
        self.queue.clear();
        self.outbox.clear();
        self.layout = PageLayout::default();
        self.zones = Zones::empty();
        self.anchor = 0;
        self.aggressive_until = 0;
        self.scroll_sample = None;
        self.scroll_velocity = 0.0;
        released
    }

    /// Host scrolled the strip
    pub fn on_scroll(&mut self, scroll_top: f64) {
        if !self.is_open {
            return;
        }
        self.viewport.scroll_top = if scroll_top.is_finite() { scroll_top.max(0.0) } else { 0.0 };
        self.update_residency();
    }

    /// Host resized the scroll container
    pub fn on_resize(&mut self, content_width: f64, content_height: f64) {
        self.viewport.content_width = content_width.max(0.0);
        self.viewport.content_height = content_height.max(0.0);
        if !self.is_open {
            return;
        }
        self.rebuild_layout();
        self.update_residency();
    }

    /// Memory pressure reported by the platform
    pub fn handle_memory_pressure(&mut self) {
        if !self.is_open || !self.residency.enabled {
            return;
        }
        self.stats.memory_pressure_hints += 1;
        self.enter_aggressive_mode(self.clock.now_ms(), "memory_pressure_hint");
        self.update_residency();
    }

    /// Periodic residency pass driven by a host timer
    pub fn sweep(&mut self) {
        if self.is_open && self.residency.enabled {
            self.update_residency();
        }
    }

    /// Cadence for [`Self::sweep`]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.residency.sweep_interval_ms)
    }

    /// Recompute anchor and zones from the current viewport and act on them
    pub fn update_residency(&mut self) {
        if !self.is_open || self.pages.is_empty() {
            return;
        }
        let anchor = self.layout.most_visible(&self.viewport).unwrap_or(self.anchor);
        self.apply_residency(anchor);
    }

    fn apply_residency(&mut self, anchor: usize) {
        let now = self.clock.now_ms();
        let page_count = self.pages.len();
        self.anchor = anchor.min(page_count - 1);
        let velocity = self.measure_scroll_velocity(now);

        if !self.residency.enabled {
            let effective = self.residency.effective(false);
            self.zones = compute_zones(self.anchor, page_count, effective.hot_radius, effective.warm_radius);
            self.flush_queue(effective.max_inflight_loads);
            return;
        }

        if self.resident_count() > self.residency.max_resident_pages.max(1) {
            self.enter_aggressive_mode(now, "resident_over_cap");
        }
        let effective = self.residency.effective(self.is_aggressive_at(now));
        let zones = compute_zones(self.anchor, page_count, effective.hot_radius, effective.warm_radius);
        self.zones = zones;

        for index in zones.warm_indices() {
            self.pages[index].touch(now);
        }

        for page in &mut self.pages {
            if should_abort_load(&*page, &zones) && page.abort() {
                self.stats.loads_aborted += 1;
                tracing::debug!(index = page.index(), "aborted load outside warm zone");
            }
        }
        self.outbox.retain(|ticket| self.pages[ticket.index].is_awaiting(ticket.load_id));

        for (page, descriptor) in self.pages.iter_mut().zip(&self.descriptors) {
            if page.status() == PageStatus::Error && !zones.is_warm(page.index()) && descriptor.has_path() {
                page.reset_error();
            }
        }

        self.queue.clear();
        for index in zones.hot_indices() {
            if self.is_load_candidate(index) {
                self.queue.push(LoadJob::new(index, self.anchor, LoadPriority::Hot));
            }
        }
        let prefetch = velocity <= effective.scroll_velocity_prefetch_cutoff
            && self.inflight_count() < effective.max_inflight_loads
            && self.resident_count() < effective.max_resident_pages;
        if prefetch {
            for index in zones.warm_indices().filter(|index| !zones.is_hot(*index)) {
                if self.is_load_candidate(index) {
                    self.queue.push(LoadJob::new(index, self.anchor, LoadPriority::Warm));
                }
            }
        }

        self.evict_out_of_zone(&effective, now);
        self.flush_queue(effective.max_inflight_loads);
    }

    fn is_load_candidate(&self, index: usize) -> bool {
        self.pages[index].status().is_load_eligible() && self.descriptors[index].has_path()
    }

    fn measure_scroll_velocity(&mut self, now: Millis) -> f64 {
        let top = self.viewport.scroll_top;
        match self.scroll_sample {
            Some((_, sampled_at)) if now <= sampled_at => return self.scroll_velocity,
            Some((sampled_top, sampled_at)) => {
                self.scroll_velocity = (top - sampled_top).abs() / (now - sampled_at) as f64;
            }
            None => self.scroll_velocity = 0.0,
        }
        self.scroll_sample = Some((top, now));
        self.scroll_velocity
    }

    fn enter_aggressive_mode(&mut self, now: Millis, reason: &'static str) {
        if !self.is_aggressive_at(now) {
            self.stats.aggressive_entries += 1;
            tracing::debug!(reason, "aggressive residency entered");
        }
        self.aggressive_until = self.aggressive_until.max(now + AGGRESSIVE_MODE_MIN_MS);
    }

    fn is_aggressive_at(&self, now: Millis) -> bool {
        now < self.aggressive_until
    }

    fn evict_out_of_zone(&mut self, effective: &EffectiveResidency, now: Millis) {
        let enforce = self.residency.enforce_zone_residency;
        let caps = EvictionCaps {
            max_resident_pages: effective.max_resident_pages,
            evict_hysteresis_ms: effective.evict_hysteresis_ms,
            allow_outside_warm_eviction: enforce,
        };

        let mut resident = self.resident_count();
        let mut candidates: Vec<(Millis, usize)> = self
            .pages
            .iter()
            .filter(|page| should_evict(*page, &self.zones, resident, &caps, now))
            .map(|page| (page.last_visible_at(), page.index()))
            .collect();
        candidates.sort_unstable();

        for (_, index) in candidates {
            if !enforce && resident <= caps.max_resident_pages {
                break;
            }
            if let Some(handle) = self.pages[index].evict() {
                tracing::debug!(index, url = %handle, "evicted page");
                self.host.release_resource(handle);
                resident -= 1;
                self.stats.evictions += 1;
                self.stats.resources_released += 1;
            }
        }
    }

    fn flush_queue(&mut self, max_inflight: usize) {
        let mut inflight = self.inflight_count();
        while inflight < max_inflight.max(1) {
            let Some(job) = self.queue.pop() else { break };
            let index = job.index;
            if !self.is_load_candidate(index) {
                continue;
            }

            self.next_load_id += 1;
            let load_id = self.next_load_id;
            let session = self.session.current();
            let cancel = self.session.child_token();
            if self.pages[index].begin_load(cancel.clone(), session, load_id).is_err() {
                continue;
            }

            self.outbox.push(LoadTicket { index, path: self.descriptors[index].path.clone(), session, load_id, cancel });
            inflight += 1;
            self.stats.loads_started += 1;
            tracing::debug!(index, load_id, priority = ?job.priority, "page load scheduled");
        }
    }

    /// Loads issued since the last call, in priority order
    pub fn take_load_requests(&mut self) -> Vec<LoadTicket> {
        std::mem::take(&mut self.outbox)
    }

    /// Apply a settled load
    ///
    /// Returns false when the completion belongs to a superseded session or an
    /// aborted load; any resource it carries is released and no page state is
    /// touched.
    pub fn complete_load(&mut self, completion: LoadCompletion) -> bool {
        let LoadCompletion { index, session, load_id, outcome } = completion;
        let is_current =
            self.session.is_current(session) && self.pages.get(index).is_some_and(|page| page.is_awaiting(load_id));

        if !is_current {
            if let LoadOutcome::Loaded { resource, .. } = outcome {
                tracing::debug!(index, load_id, url = %resource, "releasing stale page resource");
                self.host.release_resource(resource);
                self.stats.resources_released += 1;
            }
            self.stats.stale_completions += 1;
            return false;
        }

        let now = self.clock.now_ms();
        match outcome {
            LoadOutcome::Loaded { resource, natural_size } => {
                let page = &mut self.pages[index];
                let had_size = page.natural_size().is_some();
                match page.attach(resource, natural_size, now) {
                    Ok(()) => {
                        self.stats.loads_completed += 1;
                        if !had_size && page.natural_size().is_some() {
                            self.rebuild_layout();
                        }
                    }
                    Err(rejected) => {
                        tracing::warn!(error = %rejected.error, "page resource rejected");
                        self.host.release_resource(rejected.handle);
                        self.stats.resources_released += 1;
                    }
                }
                self.update_residency();
            }
            LoadOutcome::Failed(failure) => {
                if self.pages[index].mark_failed().is_ok() {
                    self.stats.loads_failed += 1;
                    tracing::debug!(index, error = %failure, "page load failed");
                }
                self.update_residency();
            }
            LoadOutcome::Aborted => {
                if self.pages[index].abort() {
                    self.stats.loads_aborted += 1;
                }
                let effective = self.residency.effective(self.is_aggressive_at(now));
                self.flush_queue(effective.max_inflight_loads);
            }
        }
        true
    }

    fn rebuild_layout(&mut self) {
        let sizes: Vec<Option<(u32, u32)>> = self.pages.iter().map(PageState::natural_size).collect();
        self.layout = PageLayout::build(&sizes, &self.viewport, self.fit_mode, &self.layout_config);
        // A shrinking strip cannot leave the viewport below its end
        self.viewport.scroll_top = self.viewport.scroll_top.min(self.layout.max_scroll_top(&self.viewport));
    }

    /// Scroll so `index` sits at the top of the viewport
    pub fn scroll_to_page(&mut self, index: usize, behavior: ScrollBehavior) -> Option<ScrollCommand> {
        self.scroll_to_page_with_offset(index, 0.0, behavior)
    }

    /// Scroll so `offset_px` into `index` sits at the top of the viewport
    pub fn scroll_to_page_with_offset(
        &mut self,
        index: usize,
        offset_px: f64,
        behavior: ScrollBehavior,
    ) -> Option<ScrollCommand> {
        if !self.is_open {
            return None;
        }
        let top = self.layout.scroll_target_with_offset(index, offset_px)?;
        self.viewport.scroll_top = top;
        self.update_residency();
        Some(ScrollCommand { top, behavior })
    }

    /// Switch between natural and fit-height, keeping the reading position
    pub fn toggle_fit_mode(&mut self) -> Option<ScrollCommand> {
        let index = self.current_page_index();
        let offset = self.current_page_offset_px();
        self.fit_mode = self.fit_mode.toggled();
        self.rebuild_layout();
        self.scroll_to_page_with_offset(index?, offset, ScrollBehavior::Auto)
    }

    /// Jump-list labels, `Page N` or `Page N (name)`
    pub fn page_labels(&self) -> Vec<String> {
        self.descriptors
            .iter()
            .enumerate()
            .map(|(index, descriptor)| {
                let name = sanitize_page_name(&descriptor.name);
                if name.is_empty() {
                    format!("Page {}", index + 1)
                } else {
                    format!("Page {} ({name})", index + 1)
                }
            })
            .collect()
    }

    /// Residency anchor; `None` without pages
    pub fn anchor_index(&self) -> Option<usize> {
        (!self.pages.is_empty()).then_some(self.anchor)
    }

    /// Page under the viewport top
    pub fn current_page_index(&self) -> Option<usize> {
        self.layout.page_at_top(self.viewport.scroll_top)
    }

    /// How far the viewport top is into the current page
    pub fn current_page_offset_px(&self) -> f64 {
        self.current_page_index().map_or(0.0, |index| self.layout.offset_within(index, self.viewport.scroll_top))
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn has_pages(&self) -> bool {
        !self.pages.is_empty()
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn page_state(&self, index: usize) -> Option<&PageState> {
        self.pages.get(index)
    }

    pub fn pages(&self) -> &[PageState] {
        &self.pages
    }

    pub fn zones(&self) -> &Zones {
        &self.zones
    }

    pub fn session(&self) -> SessionToken {
        self.session.current()
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    pub fn fit_mode(&self) -> FitMode {
        self.fit_mode
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn is_aggressive(&self) -> bool {
        self.is_aggressive_at(self.clock.now_ms())
    }

    /// Pages holding a resource
    pub fn resident_count(&self) -> usize {
        self.pages.iter().filter(|page| page.status() == PageStatus::Loaded).count()
    }

    /// Pages with a load in flight
    pub fn inflight_count(&self) -> usize {
        self.pages.iter().filter(|page| page.status() == PageStatus::Loading).count()
    }

    pub fn config(&self) -> &ResidencyConfig {
        &self.residency
    }

    /// Replace the residency configuration and re-run residency
    pub fn set_config(&mut self, config: ResidencyConfig) {
        self.residency = config.normalized();
        self.update_residency();
    }
}

impl Drop for ReaderPageController {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nview_render::BlobStore;
    use nview_scheduler::ManualClock;

    struct Harness {
        reader: ReaderPageController,
        store: Arc<BlobStore>,
        clock: ManualClock,
    }

    fn harness(config: ResidencyConfig) -> Harness {
        let store = Arc::new(BlobStore::new());
        let clock = ManualClock::new(10_000);
        let reader = ReaderPageController::new(store.clone(), Arc::new(clock.clone()))
            .with_residency(config)
            .with_viewport(Viewport::new(1280.0, 800.0));
        Harness { reader, store, clock }
    }

    /// Twenty 980x1000 pages, 1000px slots in natural mode
    fn pages(count: usize) -> Vec<PageDescriptor> {
        (0..count).map(|i| PageDescriptor::new(format!("c/{i:03}.jpg"), format!("{i:03}")).with_dimensions(980, 1000)).collect()
    }

    impl Harness {
        fn loaded(&self, ticket: LoadTicket) -> LoadCompletion {
            let resource = self.store.create_resource(vec![ticket.index as u8], "image/jpeg");
            ticket.complete(LoadOutcome::Loaded { resource, natural_size: Some((980, 1000)) })
        }

        fn take(&mut self) -> Vec<usize> {
            let tickets = self.reader.take_load_requests();
            let indices = tickets.iter().map(|ticket| ticket.index).collect();
            for ticket in tickets {
                let completion = self.loaded(ticket);
                self.reader.complete_load(completion);
            }
            indices
        }

        fn drain(&mut self) -> Vec<usize> {
            let mut all = Vec::new();
            loop {
                let batch = self.take();
                if batch.is_empty() {
                    return all;
                }
                all.extend(batch);
            }
        }

        fn scroll_to(&mut self, index: usize) {
            self.reader.on_scroll(index as f64 * 1000.0);
        }

        fn statuses(&self) -> Vec<PageStatus> {
            self.reader.pages().iter().map(PageState::status).collect()
        }

        fn assert_invariants(&self) {
            for page in self.reader.pages() {
                assert_eq!(page.resource().is_some(), page.status() == PageStatus::Loaded, "page {}", page.index());
                assert_eq!(page.has_abort_handle(), page.status() == PageStatus::Loading, "page {}", page.index());
            }
            assert_eq!(self.store.live_count(), self.reader.resident_count());
        }
    }

    #[test]
    fn open_schedules_hot_before_warm_up_to_the_inflight_cap() {
        let mut h = harness(ResidencyConfig::default().with_radii(1, 3).with_max_inflight_loads(3));
        h.reader.open(pages(20), Some(5));

        let tickets = h.reader.take_load_requests();
        let order: Vec<usize> = tickets.iter().map(|t| t.index).collect();
        assert_eq!(order, vec![5, 4, 6]);
        assert_eq!(h.reader.anchor_index(), Some(5));
        assert_eq!(h.reader.inflight_count(), 3);

        // Finishing one load frees a slot for the nearest warm page
        for ticket in tickets {
            let completion = h.loaded(ticket);
            assert!(h.reader.complete_load(completion));
        }
        let next: Vec<usize> = h.reader.take_load_requests().iter().map(|t| t.index).collect();
        assert_eq!(next, vec![3, 7, 2]);
        h.assert_invariants();
    }

    #[test]
    fn anchor_follows_the_most_visible_page() {
        let mut h = harness(ResidencyConfig::default().with_radii(0, 1));
        h.reader.open(pages(10), None);
        h.drain();

        h.reader.on_scroll(3600.0);
        assert_eq!(h.reader.anchor_index(), Some(3));
        assert_eq!(h.reader.current_page_index(), Some(3));
        assert_eq!(h.reader.current_page_offset_px(), 600.0);

        h.reader.on_scroll(3700.0);
        assert_eq!(h.reader.anchor_index(), Some(4));
        assert_eq!(h.reader.current_page_index(), Some(3));
    }

    #[test]
    fn stale_completion_from_previous_session_is_released() {
        let mut h = harness(ResidencyConfig::default());
        h.reader.open(vec![PageDescriptor::new("old.jpg", "old")], None);
        let old_ticket = h.reader.take_load_requests().remove(0);
        assert!(!old_ticket.cancel.is_cancelled());

        h.reader.open(vec![PageDescriptor::new("new.jpg", "new")], None);
        assert!(old_ticket.cancel.is_cancelled());
        let new_ticket = h.reader.take_load_requests().remove(0);
        assert_eq!(new_ticket.path, "new.jpg");

        let fresh = h.loaded(new_ticket);
        assert!(h.reader.complete_load(fresh));
        let stale = h.loaded(old_ticket);
        assert!(!h.reader.complete_load(stale));

        let page = h.reader.page_state(0).unwrap();
        assert_eq!(page.resource().map(ResourceHandle::url), Some("blob:nview/1"));
        assert_eq!(h.store.revoked(), vec!["blob:nview/2".to_string()]);
        assert_eq!(h.reader.stats().stale_completions, 1);
        h.assert_invariants();
    }

    #[test]
    fn loads_leaving_warm_are_aborted_and_their_results_discarded() {
        let mut h = harness(ResidencyConfig::default().with_radii(1, 2).with_max_inflight_loads(3));
        h.reader.open(pages(20), None);
        let tickets = h.reader.take_load_requests();
        assert_eq!(tickets.iter().map(|t| t.index).collect::<Vec<_>>(), vec![0, 1, 2]);

        h.clock.advance(5_000);
        h.scroll_to(10);
        assert!(tickets.iter().all(|t| t.cancel.is_cancelled()));
        assert_eq!(h.reader.stats().loads_aborted, 3);
        assert_eq!(h.reader.page_state(0).unwrap().status(), PageStatus::Idle);

        let next: Vec<usize> = h.reader.take_load_requests().iter().map(|t| t.index).collect();
        assert_eq!(next, vec![10, 9, 11]);

        for ticket in tickets {
            let completion = h.loaded(ticket);
            assert!(!h.reader.complete_load(completion));
        }
        assert_eq!(h.store.live_count(), 0);
        h.assert_invariants();
    }

    #[test]
    fn enforced_residency_evicts_everything_outside_warm_after_hysteresis() {
        let mut h = harness(ResidencyConfig::default().with_radii(0, 1).with_evict_hysteresis_ms(1_000));
        h.reader.open(pages(10), None);
        assert_eq!(h.drain(), vec![0, 1]);

        h.clock.advance(100);
        h.scroll_to(5);
        h.drain();
        assert_eq!(h.statuses()[0], PageStatus::Loaded);
        assert_eq!(h.statuses()[1], PageStatus::Loaded);

        h.clock.advance(1_000);
        h.reader.sweep();
        assert_eq!(h.statuses()[0], PageStatus::Evicted);
        assert_eq!(h.statuses()[1], PageStatus::Evicted);
        assert_eq!(h.reader.stats().evictions, 2);
        assert!(h.reader.zones().is_warm(5));
        h.assert_invariants();
    }

    #[test]
    fn cap_mode_evicts_oldest_until_back_under_cap() {
        let config = ResidencyConfig::default()
            .with_radii(1, 1)
            .with_max_resident_pages(2)
            .with_evict_hysteresis_ms(0)
            .with_enforce_zone_residency(false);
        let mut h = harness(config);
        h.reader.open(pages(10), None);
        assert_eq!(h.drain(), vec![0, 1]);

        h.clock.advance(50);
        h.scroll_to(3);
        h.drain();

        assert_eq!(h.store.revoked(), vec!["blob:nview/1".to_string(), "blob:nview/2".to_string()]);
        assert_eq!(
            h.statuses()[..5],
            [PageStatus::Evicted, PageStatus::Evicted, PageStatus::Loaded, PageStatus::Loaded, PageStatus::Loaded]
        );
        // Over the cap but every resident page is protected
        assert_eq!(h.reader.resident_count(), 3);
        assert!(h.reader.is_aggressive());
        h.assert_invariants();
    }

    #[test]
    fn memory_pressure_shrinks_zones_for_a_while() {
        let mut h = harness(ResidencyConfig::default().with_radii(4, 8));
        h.reader.open(pages(40), Some(20));
        assert_eq!(h.reader.zones().warm.map(|w| w.len()), Some(17));

        h.reader.handle_memory_pressure();
        assert!(h.reader.is_aggressive());
        assert_eq!(h.reader.zones().hot.map(|w| (w.start, w.end)), Some((18, 22)));
        assert_eq!(h.reader.zones().warm.map(|w| (w.start, w.end)), Some((16, 24)));
        assert_eq!(h.reader.stats().memory_pressure_hints, 1);
        assert_eq!(h.reader.stats().aggressive_entries, 1);

        h.clock.advance(AGGRESSIVE_MODE_MIN_MS);
        h.reader.sweep();
        assert!(!h.reader.is_aggressive());
        assert_eq!(h.reader.zones().warm.map(|w| w.len()), Some(17));
    }

    #[test]
    fn fast_scrolling_skips_warm_prefetch() {
        let mut h = harness(ResidencyConfig::default().with_radii(0, 3));
        h.reader.open(pages(40), None);
        h.drain();

        h.clock.advance(100);
        h.scroll_to(20);
        let fast: Vec<usize> = h.reader.take_load_requests().iter().map(|t| t.index).collect();
        assert_eq!(fast, vec![20]);
    }

    #[test]
    fn disabled_residency_loads_everything_and_never_evicts() {
        let config = ResidencyConfig::default().with_enabled(false).with_max_inflight_loads(2).with_radii(0, 0);
        let mut h = harness(config);
        h.reader.open(pages(5), None);

        assert_eq!(h.take(), vec![0, 1]);
        let mut rest = h.drain();
        rest.sort_unstable();
        assert_eq!(rest, vec![2, 3, 4]);

        h.clock.advance(60_000);
        h.scroll_to(4);
        h.reader.sweep();
        assert_eq!(h.reader.resident_count(), 5);
        assert_eq!(h.reader.stats().evictions, 0);
    }

    #[test]
    fn failed_pages_retry_only_after_leaving_warm() {
        let mut h = harness(ResidencyConfig::default().with_radii(0, 1).with_max_inflight_loads(1));
        h.reader.open(pages(10), None);

        let ticket = h.reader.take_load_requests().remove(0);
        assert!(h.reader.complete_load(ticket.complete(LoadOutcome::Failed(LoadFailure::Http { status: 500 }))));
        assert_eq!(h.statuses()[0], PageStatus::Error);

        // Sibling loads continue, the failed page is not retried in place
        assert_eq!(h.drain(), vec![1]);
        h.reader.sweep();
        assert!(h.reader.take_load_requests().is_empty());

        h.clock.advance(10);
        h.scroll_to(6);
        h.drain();
        assert_eq!(h.statuses()[0], PageStatus::Idle);

        h.clock.advance(10);
        h.scroll_to(0);
        assert_eq!(h.reader.take_load_requests().first().map(|t| t.index), Some(0));
        assert_eq!(h.reader.stats().loads_failed, 1);
    }

    #[test]
    fn pages_without_path_fail_without_a_fetch() {
        let mut h = harness(ResidencyConfig::default());
        let mut list = pages(3);
        list[1].path = String::new();
        h.reader.open(list, None);

        let scheduled = h.drain();
        assert!(!scheduled.contains(&1));
        assert_eq!(h.statuses()[1], PageStatus::Error);

        h.clock.advance(10);
        h.scroll_to(2);
        h.reader.sweep();
        assert_eq!(h.statuses()[1], PageStatus::Error);
    }

    #[test]
    fn close_releases_everything_and_is_idempotent() {
        let mut h = harness(ResidencyConfig::default());
        let session = h.reader.open(pages(6), None);
        h.take();
        let pending = h.reader.take_load_requests();
        assert!(h.reader.resident_count() > 0);

        h.reader.close();
        h.reader.close();
        assert!(!h.reader.has_pages());
        assert_eq!(h.reader.anchor_index(), None);
        assert_eq!(h.store.live_count(), 0);
        assert_ne!(h.reader.session(), session);

        for ticket in pending {
            let completion = h.loaded(ticket);
            assert!(!h.reader.complete_load(completion));
        }
        assert_eq!(h.store.live_count(), 0);
    }

    #[test]
    fn reopen_creates_fresh_state() {
        let mut h = harness(ResidencyConfig::default());
        let first = h.reader.open(pages(4), None);
        h.drain();
        let second = h.reader.open(pages(4), None);

        assert!(second > first);
        assert!(h.reader.pages().iter().all(|p| p.status() != PageStatus::Loaded));
        assert_eq!(h.store.live_count(), 0);
    }

    #[test]
    fn decoded_dimensions_update_the_layout() {
        let mut h = harness(ResidencyConfig::default().with_radii(0, 0));
        h.reader.open(vec![PageDescriptor::new("a.jpg", "a"), PageDescriptor::new("b.jpg", "b")], None);
        assert_eq!(h.reader.layout().metric(0).map(|m| m.height), Some(1421.0));

        let ticket = h.reader.take_load_requests().remove(0);
        let resource = h.store.create_resource(vec![0], "image/png");
        h.reader.complete_load(ticket.complete(LoadOutcome::Loaded { resource, natural_size: Some((490, 700)) }));

        assert_eq!(h.reader.page_state(0).unwrap().natural_size(), Some((490, 700)));
        assert_eq!(h.reader.layout().metric(0).map(|m| m.height), Some(700.0));
        assert_eq!(h.reader.layout().metric(1).map(|m| m.height), Some(700.0));
    }

    #[test]
    fn scroll_commands_and_fit_toggle_keep_position() {
        let mut h = harness(ResidencyConfig::default());
        h.reader.open(pages(10), None);

        let command = h.reader.scroll_to_page(4, ScrollBehavior::Smooth).unwrap();
        assert_eq!(command, ScrollCommand { top: 4000.0, behavior: ScrollBehavior::Smooth });
        assert_eq!(h.reader.current_page_index(), Some(4));

        h.reader.scroll_to_page_with_offset(4, 250.0, ScrollBehavior::Auto);
        let toggled = h.reader.toggle_fit_mode().unwrap();
        assert_eq!(h.reader.fit_mode(), FitMode::FitHeight);
        // 772px slots in fit-height for an 800px viewport
        assert_eq!(toggled.top, 4.0 * 772.0 + 250.0);
        assert_eq!(h.reader.current_page_index(), Some(4));
        assert_eq!(h.reader.current_page_offset_px(), 250.0);
    }

    #[test]
    fn labels_include_sanitized_names() {
        let mut h = harness(ResidencyConfig::default());
        h.reader.open(vec![PageDescriptor::new("a.jpg", " cover\t"), PageDescriptor::new("b.jpg", "")], None);
        assert_eq!(h.reader.page_labels(), vec!["Page 1 (cover)".to_string(), "Page 2".to_string()]);
        assert_eq!(ScrollBehavior::Smooth.as_str(), "smooth");
    }

    #[test]
    fn anchor_survives_strip_shrinking_after_decode() {
        let mut h = harness(ResidencyConfig::default());
        let unsized_pages = (0..20).map(|i| PageDescriptor::new(format!("c/{i:03}.jpg"), "")).collect();
        h.reader.open(unsized_pages, Some(19));

        let mut tickets = h.reader.take_load_requests();
        assert_eq!(tickets.iter().map(|t| t.index).collect::<Vec<_>>(), vec![19, 18, 17]);

        // 1421px fallback slots collapse to 700px once page 19 reports its size
        let last = tickets.remove(0);
        let resource = h.store.create_resource(vec![19], "image/jpeg");
        assert!(h.reader.complete_load(last.complete(LoadOutcome::Loaded { resource, natural_size: Some((490, 700)) })));

        assert_eq!(h.reader.layout().total_height(), 14_000.0);
        assert_eq!(h.reader.viewport().scroll_top, 13_200.0);
        assert_eq!(h.reader.anchor_index(), Some(19));
        assert_eq!(h.reader.stats().loads_aborted, 0);

        let statuses = h.statuses();
        assert_eq!(statuses[17], PageStatus::Loading);
        assert_eq!(statuses[18], PageStatus::Loading);
        assert_eq!(statuses[19], PageStatus::Loaded);
        assert!(statuses[..3].iter().all(|status| *status == PageStatus::Idle));

        h.clock.advance(60_000);
        h.reader.sweep();
        assert_eq!(h.reader.page_state(19).unwrap().status(), PageStatus::Loaded);
        h.assert_invariants();
    }

    #[test]
    fn collapsed_viewport_keeps_anchor() {
        let mut h = harness(ResidencyConfig::default());
        h.reader.open(pages(20), Some(10));
        let pending: Vec<usize> = h.reader.take_load_requests().iter().map(|t| t.index).collect();
        assert_eq!(pending, vec![10, 9, 11]);

        h.reader.on_resize(1280.0, 0.0);

        assert_eq!(h.reader.anchor_index(), Some(10));
        assert_eq!(h.reader.stats().loads_aborted, 0);
        assert!(pending.iter().all(|&index| h.reader.page_state(index).unwrap().status() == PageStatus::Loading));
        assert_eq!(h.reader.page_state(0).unwrap().status(), PageStatus::Idle);
    }

    #[test]
    fn scrolling_past_the_end_anchors_on_last_page() {
        let mut h = harness(ResidencyConfig::default());
        h.reader.open(pages(20), None);
        h.drain();

        h.reader.on_scroll(99_999.0);

        assert_eq!(h.reader.anchor_index(), Some(19));
        assert_eq!(h.reader.take_load_requests().first().map(|t| t.index), Some(19));
    }
}
