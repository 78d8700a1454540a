//! Eviction and abort predicates
//!
//! Both predicates are pure: they read a page through [`ResidencyView`] and
//! decide, leaving the actual release or abort to the caller.

use crate::clock::Millis;
use crate::status::PageStatus;
use crate::zones::Zones;

/// Read-only view of a page's residency bookkeeping
pub trait ResidencyView {
    /// Index of the page in the document
    fn page_index(&self) -> usize;

    /// Current lifecycle status
    fn status(&self) -> PageStatus;

    /// Last time the page was inside the hot or warm zone
    fn last_visible_at(&self) -> Millis;
}

/// Limits the eviction policy checks against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionCaps {
    /// Resident pages tolerated before out-of-zone pages are trimmed
    pub max_resident_pages: usize,

    /// Minimum time since last visible before a page may be evicted
    pub evict_hysteresis_ms: Millis,

    /// Evict any out-of-zone page past hysteresis, ignoring the cap
    pub allow_outside_warm_eviction: bool,
}

impl Default for EvictionCaps {
    fn default() -> Self {
        Self { max_resident_pages: 16, evict_hysteresis_ms: 2000, allow_outside_warm_eviction: false }
    }
}

/// Whether a page's resources may be released now
///
/// Only LOADED pages are candidates. Hot and warm pages are always protected,
/// then hysteresis, then either the pressure-relief flag or the resident cap
/// decides.
pub fn should_evict<P: ResidencyView + ?Sized>(
    page: &P,
    zones: &Zones,
    resident_count: usize,
    caps: &EvictionCaps,
    now: Millis,
) -> bool {
    if page.status() != PageStatus::Loaded {
        return false;
    }

    let index = page.page_index();
    if zones.is_hot(index) || zones.is_warm(index) {
        return false;
    }

    if now.saturating_sub(page.last_visible_at()) < caps.evict_hysteresis_ms {
        return false;
    }

    if caps.allow_outside_warm_eviction {
        return true;
    }

    resident_count > caps.max_resident_pages.max(1)
}

/// Whether an in-flight load should be aborted after a zone recompute
pub fn should_abort_load<P: ResidencyView + ?Sized>(page: &P, zones: &Zones) -> bool {
    page.status() == PageStatus::Loading && !zones.is_warm(page.page_index())
}
