// crates/toolgate-core/src/entry.rs
// ============================================================================
// Module: Toolgate Stored Entries
// Description: Versioned entry representation shared by all storage backends.
// Purpose: Carry values with engine-owned version metadata, caller metadata,
//          and lazy expiry alongside each stored key.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every backend persists one [`StoredEntry`] per key. The version is a
//! monotonically increasing integer carried as a decimal string; it starts at
//! `"1"` on first write and increments by exactly one on every successful
//! write. The engine computes versions only from the current stored entry.
//! Caller-supplied metadata lives in its own map and can never influence the
//! version.
//!
//! An entry whose version fails to parse as a positive integer is treated as
//! untrustworthy: the version-aware read path reports it as absent rather
//! than silently adopting a corrupted baseline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::time::Timestamp;

// ============================================================================
// SECTION: Stored Entry
// ============================================================================

/// A versioned entry stored under a single key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    /// Opaque serialized value.
    pub value: Value,
    /// Engine-owned version as a decimal string, starting at `"1"`.
    pub version: String,
    /// Caller-supplied metadata. Never consulted for versioning.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Expiry instant for lazy TTL enforcement, when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
}

impl StoredEntry {
    /// Returns true when the entry is expired at the given instant.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }

    /// Returns the parsed version, or `None` when the version metadata is
    /// missing or was tampered with.
    #[must_use]
    pub fn parsed_version(&self) -> Option<u64> {
        parse_version(&self.version)
    }
}

// ============================================================================
// SECTION: Versioned Wrapper
// ============================================================================

/// A value paired with its trustworthy version string.
///
/// Returned only from the version-aware read path so that the plain `get`
/// path stays simple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// The stored value.
    pub value: T,
    /// The entry version as a decimal string.
    pub version: String,
}

// ============================================================================
// SECTION: Version Arithmetic
// ============================================================================

/// Parses a version string into a positive integer.
///
/// Returns `None` for empty, non-numeric, or zero versions: a stored entry
/// never legitimately carries version `"0"`, so anything that fails here is
/// missing or tampered metadata.
#[must_use]
pub fn parse_version(version: &str) -> Option<u64> {
    if version.is_empty() || !version.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    match version.parse::<u64>() {
        Ok(parsed) if parsed > 0 => Some(parsed),
        _ => None,
    }
}

/// Computes the next version string from the current stored entry.
///
/// A missing entry (or one whose version cannot be trusted) restarts the
/// sequence at `"1"`.
#[must_use]
pub fn next_version(current: Option<&StoredEntry>) -> String {
    let current_version = current.and_then(StoredEntry::parsed_version).unwrap_or(0);
    current_version.saturating_add(1).to_string()
}

/// Returns true when an expected version denotes "the key must not exist".
///
/// Both `"0"` and the empty string are accepted as the create sentinel.
#[must_use]
pub fn expects_missing(expected_version: &str) -> bool {
    expected_version.is_empty() || expected_version == "0"
}

// ============================================================================
// SECTION: Tests
// ============================================================================
