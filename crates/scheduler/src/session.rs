//! Session tokens and structured cancellation scopes
//!
//! Every reader session owns one cancellation scope. Loads started in the
//! session receive child tokens of that scope, so beginning a new session (or
//! closing the reader) signals every outstanding load at once. The session
//! token itself is what completions are checked against; cancellation is only
//! best-effort.

use std::fmt;

pub use tokio_util::sync::CancellationToken;

/// Monotonically increasing reader session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SessionToken(u64);

impl SessionToken {
    /// Raw token value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// Owner of the live session token and its cancellation scope
///
/// # Example
///
/// ```
/// use nview_scheduler::SessionGuard;
///
/// let mut guard = SessionGuard::new();
/// let first = guard.begin();
/// let load = guard.child_token();
///
/// let second = guard.begin();
/// assert!(load.is_cancelled());
/// assert!(!guard.is_current(first));
/// assert!(guard.is_current(second));
/// ```
#[derive(Debug)]
pub struct SessionGuard {
    current: SessionToken,
    scope: CancellationToken,
}

impl SessionGuard {
    /// Create a guard with no session begun yet
    pub fn new() -> Self {
        Self { current: SessionToken::default(), scope: CancellationToken::new() }
    }

    /// Cancel the current scope and mint a new session token
    pub fn begin(&mut self) -> SessionToken {
        self.rotate();
        tracing::debug!(session = self.current.get(), "session begun");
        self.current
    }

    /// Cancel the current scope and retire its token without starting new work
    ///
    /// Used on close so that completions from the closed session are stale.
    pub fn invalidate(&mut self) -> SessionToken {
        self.rotate();
        tracing::debug!(session = self.current.get(), "session invalidated");
        self.current
    }

    fn rotate(&mut self) {
        self.scope.cancel();
        self.scope = CancellationToken::new();
        self.current = SessionToken(self.current.0.wrapping_add(1));
    }

    /// The live token
    pub fn current(&self) -> SessionToken {
        self.current
    }

    /// Whether `token` is the live token
    pub fn is_current(&self, token: SessionToken) -> bool {
        self.current == token
    }

    /// Abort handle for one operation in the live session
    pub fn child_token(&self) -> CancellationToken {
        self.scope.child_token()
    }
}

impl Default for SessionGuard {
    fn default() -> Self {
        Self::new()
    }
}
