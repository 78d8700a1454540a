//! Millisecond clock used by residency timing decisions
//!
//! Every timing decision (hysteresis, aggressive-mode windows, scroll velocity)
//! is made against a [`Clock`] so that the controller can be driven by a manual
//! clock in tests and by the system clock in the application.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since an arbitrary, clock-specific epoch
pub type Millis = u64;

/// Source of the current time in milliseconds
pub trait Clock: Send + Sync {
    /// Current time in milliseconds
    fn now_ms(&self) -> Millis;
}

/// Wall clock backed by [`SystemTime`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> Millis {
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as Millis).unwrap_or(0)
    }
}

/// Manually advanced clock
///
/// Clones share the same underlying time, so a test can hand one clone to the
/// controller and keep another to advance time.
///
/// # Example
///
/// ```
/// use nview_scheduler::{Clock, ManualClock};
///
/// let clock = ManualClock::new(1_000);
/// let shared = clock.clone();
/// clock.advance(250);
/// assert_eq!(shared.now_ms(), 1_250);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock starting at `start_ms`
    pub fn new(start_ms: Millis) -> Self {
        Self { now: Arc::new(AtomicU64::new(start_ms)) }
    }

    /// Move the clock forward by `delta_ms`
    pub fn advance(&self, delta_ms: Millis) {
        self.now.fetch_add(delta_ms, Ordering::AcqRel);
    }

    /// Jump to an absolute time
    pub fn set(&self, now_ms: Millis) {
        self.now.store(now_ms, Ordering::Release);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        self.now.load(Ordering::Acquire)
    }
}
