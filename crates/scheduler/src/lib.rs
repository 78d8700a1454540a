//! nview scheduler
//!
//! Pure residency decisions for a virtualized page strip.
//!
//! This crate decides which pages of a long, scroll-driven reader should be
//! resident: the hot/warm zones around the anchor page, the order in which
//! pending loads are issued, when a resident page may be evicted, and when an
//! in-flight load has become pointless. It also owns the session guard that
//! makes completions from a superseded reader session detectably stale.
//!
//! Nothing here performs I/O; the controller in `nview-core` drives it.
//!
//! # Example
//!
//! ```
//! use nview_scheduler::{compute_zones, LoadJob, LoadPriority, LoadQueue};
//!
//! let anchor = 5;
//! let zones = compute_zones(anchor, 12, 1, 3);
//!
//! let mut queue = LoadQueue::new();
//! for index in zones.warm_indices() {
//!     let priority = if zones.is_hot(index) { LoadPriority::Hot } else { LoadPriority::Warm };
//!     queue.push(LoadJob::new(index, anchor, priority));
//! }
//!
//! // The anchor page itself is requested first
//! assert_eq!(queue.pop().map(|job| job.index), Some(5));
//! ```

mod clock;
mod eviction;
mod priority;
mod session;
mod status;
mod zones;

// Re-export public API
pub use clock::{Clock, ManualClock, Millis, SystemClock};
pub use eviction::{should_abort_load, should_evict, EvictionCaps, ResidencyView};
pub use priority::{priority_for_index, LoadJob, LoadPriority, LoadQueue};
pub use session::{CancellationToken, SessionGuard, SessionToken};
pub use status::PageStatus;
pub use zones::{compute_zones, ZoneWindow, Zones};
