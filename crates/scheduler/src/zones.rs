//! Hot/warm zone calculation around the reader anchor
//!
//! The reader keeps two index windows around the page currently in view:
//! 1. Hot zone - pages that must be resident and loaded
//! 2. Warm zone - pages that are prefetched and protected from eviction
//!
//! Both windows are contiguous and clipped at the document boundaries, so the
//! hot zone is always a subset of the warm zone.

use std::ops::RangeInclusive;

/// Inclusive, non-empty range of page indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ZoneWindow {
    /// First index in the window
    pub start: usize,

    /// Last index in the window (inclusive)
    pub end: usize,
}

impl ZoneWindow {
    fn around(anchor: usize, radius: usize, last_index: usize) -> Self {
        Self { start: anchor.saturating_sub(radius), end: anchor.saturating_add(radius).min(last_index) }
    }

    /// Whether `index` falls inside the window
    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index <= self.end
    }

    /// Number of indices in the window
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Always false; windows are never empty
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Indices covered by the window, ascending
    pub fn indices(&self) -> RangeInclusive<usize> {
        self.start..=self.end
    }
}

/// Hot and warm windows for one anchor position
///
/// Both windows are `None` for an empty document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Zones {
    /// Window that must stay resident
    pub hot: Option<ZoneWindow>,

    /// Window that is prefetched and protected from eviction
    pub warm: Option<ZoneWindow>,
}

impl Zones {
    /// Zones for an empty document
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether `index` is in the hot zone
    pub fn is_hot(&self, index: usize) -> bool {
        self.hot.is_some_and(|window| window.contains(index))
    }

    /// Whether `index` is in the warm zone
    pub fn is_warm(&self, index: usize) -> bool {
        self.warm.is_some_and(|window| window.contains(index))
    }

    /// Hot indices, ascending
    pub fn hot_indices(&self) -> impl Iterator<Item = usize> {
        self.hot.into_iter().flat_map(|window| window.indices())
    }

    /// Warm indices, ascending
    pub fn warm_indices(&self) -> impl Iterator<Item = usize> {
        self.warm.into_iter().flat_map(|window| window.indices())
    }
}

/// Compute the hot and warm zones around `anchor_index`
///
/// The anchor is clamped into `[0, page_count)` and a warm radius smaller than
/// the hot radius is raised to it, which keeps `hot ⊆ warm` for any input.
///
/// # Example
///
/// ```
/// use nview_scheduler::compute_zones;
///
/// let zones = compute_zones(0, 10, 2, 4);
/// assert_eq!(zones.hot_indices().collect::<Vec<_>>(), vec![0, 1, 2]);
/// assert_eq!(zones.warm_indices().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
/// ```
pub fn compute_zones(
    anchor_index: usize,
    page_count: usize,
    hot_radius: usize,
    warm_radius: usize,
) -> Zones {
    if page_count == 0 {
        return Zones::empty();
    }

    let last_index = page_count - 1;
    let anchor = anchor_index.min(last_index);
    let warm_radius = warm_radius.max(hot_radius);

    Zones {
        hot: Some(ZoneWindow::around(anchor, hot_radius, last_index)),
        warm: Some(ZoneWindow::around(anchor, warm_radius, last_index)),
    }
}
