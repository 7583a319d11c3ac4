//! Millisecond wall-clock timestamps.
//!
//! The HTTP surface and the persisted layout both carry timestamps as raw
//! millisecond integers, so the core type is a thin wrapper around `u64`
//! rather than a structured clock. Causality is tracked separately by
//! vector clocks; these timestamps only feed last-writer-wins tiebreaks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Returns the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before Unix epoch")
            .as_millis() as u64;
        Self(millis)
    }

    /// Creates a timestamp from raw milliseconds.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns the raw millisecond value.
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Returns the current time, bumped past `self` if the wall clock has
    /// not advanced. Keeps local write stamps strictly increasing even on
    /// coarse or stalled clocks.
    #[must_use]
    pub fn advance(&self) -> Self {
        let now = Self::now();
        if now > *self {
            now
        } else {
            Self(self.0 + 1)
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Timestamp {
    fn from(millis: u64) -> Self {
        Self(millis)
    }
}

impl From<Timestamp> for u64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}
