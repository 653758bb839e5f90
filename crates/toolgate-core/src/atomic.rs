// crates/toolgate-core/src/atomic.rs
// ============================================================================
// Module: Toolgate Atomic Update
// Description: Read-mutate-compare-and-swap retry helper.
// Purpose: Provide the recommended pattern for counters and any value that
//          must reflect every concurrent update.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! [`atomic_update`] wraps `get_with_version` + a caller mutation +
//! `put_if_match` in a bounded retry loop. On each failed compare-and-swap it
//! re-reads the latest version and retries. Under the in-memory backend the
//! loop converges because the compare-and-swap there is truly serialized;
//! on best-effort backends the loop narrows but cannot close the documented
//! guarantee gap.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::entry::expects_missing;
use crate::entry::parse_version;
use crate::storage::KeyValueStore;
use crate::storage::PutOptions;
use crate::storage::StorageError;

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Result of an [`atomic_update`] attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicUpdateOutcome {
    /// Whether the update was committed.
    pub success: bool,
    /// The version written on success.
    pub version: Option<String>,
    /// Number of retries consumed (zero when the first attempt committed).
    pub retries: u32,
}

// ============================================================================
// SECTION: Atomic Update
// ============================================================================

/// Applies a mutation with optimistic concurrency, retrying on conflicts.
///
/// The mutation receives the current value (or `None` when the key is
/// absent) and returns the replacement value. After `max_retries` failed
/// compare-and-swap attempts the helper gives up and reports failure without
/// writing.
///
/// # Errors
///
/// Returns [`StorageError`] when the underlying store fails; version
/// conflicts are retried, not surfaced as errors.
pub fn atomic_update<F>(
    store: &dyn KeyValueStore,
    key: &str,
    max_retries: u32,
    mut mutate: F,
) -> Result<AtomicUpdateOutcome, StorageError>
where
    F: FnMut(Option<&Value>) -> Value,
{
    let mut retries = 0u32;
    loop {
        let current = store.get_with_version(key)?;
        let expected = current.as_ref().map_or_else(|| "0".to_string(), |v| v.version.clone());
        let next = mutate(current.as_ref().map(|v| &v.value));
        if store.put_if_match(key, next, &expected, PutOptions::default())? {
            let committed = if expects_missing(&expected) {
                1
            } else {
                parse_version(&expected).unwrap_or(0).saturating_add(1)
            };
            return Ok(AtomicUpdateOutcome {
                success: true,
                version: Some(committed.to_string()),
                retries,
            });
        }
        if retries >= max_retries {
            return Ok(AtomicUpdateOutcome {
                success: false,
                version: None,
                retries,
            });
        }
        retries = retries.saturating_add(1);
    }
}
