// crates/toolgate-core/src/time.rs
// ============================================================================
// Module: Toolgate Timestamps
// Description: Millisecond-precision wall-clock timestamps.
// Purpose: Provide a single timestamp representation for entry expiry,
//          provisioning records, and progress tracking.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Timestamps are milliseconds since the Unix epoch, serialized as plain
//! integers. Millisecond precision is sufficient for TTL expiry and audit
//! ordering; no timezone or calendar arithmetic is needed in the core.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Milliseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Creates a timestamp from raw epoch milliseconds.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns the current wall-clock time.
    ///
    /// Clocks before the Unix epoch collapse to zero rather than failing.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        Self(millis)
    }

    /// Returns the raw epoch milliseconds.
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Returns this timestamp advanced by the given duration, saturating.
    #[must_use]
    pub fn saturating_add(self, duration: Duration) -> Self {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(millis))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
