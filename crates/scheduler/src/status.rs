//! Page residency status

use std::fmt;

/// Lifecycle status of a single reader page
///
/// `Idle -> Loading -> {Loaded, Error}`, `Loaded -> Evicted`, `Loading -> Idle`
/// on abort. `Evicted` pages are load-eligible exactly like `Idle` ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PageStatus {
    /// Nothing requested yet
    #[default]
    Idle,

    /// Fetch/decode in flight
    Loading,

    /// Renderable resource attached
    Loaded,

    /// Fetch or decode failed for the current zone visit
    Error,

    /// Resource released by the eviction policy
    Evicted,
}

impl PageStatus {
    /// Stable lowercase name, used in logs and JSON output
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Error => "error",
            Self::Evicted => "evicted",
        }
    }

    /// Whether a new load may be started from this status
    pub fn is_load_eligible(self) -> bool {
        matches!(self, Self::Idle | Self::Evicted)
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
