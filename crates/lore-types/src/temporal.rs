use std::fmt;

use serde::{Deserialize, Serialize};

/// An instant on the in-fiction calendar.
///
/// World time orders snapshots and is supplied by the caller; it has no
/// relation to the wall clock. Internally it is a signed millisecond tick
/// count so that campaigns may use any epoch, including ones before 1970.
///
/// Ordering is plain integer ordering (total order).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldTime(i64);

impl WorldTime {
    /// Create a world time from a raw tick count.
    pub const fn from_ticks(ticks: i64) -> Self {
        Self(ticks)
    }

    /// The raw tick count.
    pub const fn ticks(&self) -> i64 {
        self.0
    }
}

impl From<i64> for WorldTime {
    fn from(ticks: i64) -> Self {
        Self(ticks)
    }
}

impl fmt::Debug for WorldTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WorldTime({})", self.0)
    }
}

impl fmt::Display for WorldTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}
