//! Stream progress positions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// How far a stream has advanced, as a nanosecond timestamp.
///
/// Progress is what flow control reasons about: the global minimum progress
/// plus a configured window yields the upper limit a stream may fetch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Progress(i64);

impl Progress {
    /// Sentinel for "no progress recorded yet".
    pub const INVALID: Progress = Progress(i64::MIN);

    pub const fn from_nanos(nanos: i64) -> Self {
        Progress(nanos)
    }

    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self != Progress::INVALID
    }

    /// Advance by a window, clamping instead of wrapping.
    pub fn saturating_add(self, window: Duration) -> Progress {
        let nanos = i64::try_from(window.as_nanos()).unwrap_or(i64::MAX);
        Progress(self.0.saturating_add(nanos))
    }
}

impl Default for Progress {
    fn default() -> Self {
        Progress::INVALID
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}ns", self.0)
        } else {
            write!(f, "INVALID")
        }
    }
}
