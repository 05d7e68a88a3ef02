// crates/labelcache-core/src/core/time.rs
// ============================================================================
// Module: Label Cache Time Model
// Description: Unix-second timestamps for maintenance markers.
// Purpose: Keep "refreshed at" values explicit and comparable.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Maintenance markers store unix seconds. A timestamp of zero is a valid
//! value; absence is always modelled as `Option::None` by callers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Unix timestamp in whole seconds.
///
/// # Invariants
/// - `Timestamp(0)` is a real instant (the epoch), never a sentinel for absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix seconds.
    #[must_use]
    pub const fn from_unix_seconds(seconds: i64) -> Self {
        Self(seconds)
    }

    /// Returns the timestamp as unix seconds.
    #[must_use]
    pub const fn as_unix_seconds(self) -> i64 {
        self.0
    }

    /// Returns the current wall-clock time.
    ///
    /// Clocks set before the epoch clamp to zero.
    #[must_use]
    pub fn now() -> Self {
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        Self(seconds)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
