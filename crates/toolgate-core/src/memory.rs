// crates/toolgate-core/src/memory.rs
// ============================================================================
// Module: Toolgate In-Memory Store
// Description: Volatile in-process key-value backend.
// Purpose: Provide a deterministic backend for tests, local runs, and as the
//          reference semantics for the storage contract.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! The in-memory backend holds every entry in one mutex-guarded map. Because
//! each operation runs under that single mutex, `put_if_match` here is a true
//! compare-and-swap rather than the best-effort guarantee the contract
//! promises; callers cannot observe the difference except that retry loops
//! always converge.
//!
//! Contents are volatile and lost on process exit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use serde_json::Value;

use crate::entry::StoredEntry;
use crate::entry::Versioned;
use crate::entry::expects_missing;
use crate::entry::next_version;
use crate::storage::KeyValueStore;
use crate::storage::ListOptions;
use crate::storage::ListPage;
use crate::storage::PutOptions;
use crate::storage::StorageError;
use crate::time::Timestamp;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Volatile in-process key-value store.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    /// Entry map protected by a mutex.
    entries: Arc<Mutex<BTreeMap<String, StoredEntry>>>,
}

impl MemoryStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Locks the entry map, surfacing poisoning as a storage error.
    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, StoredEntry>>, StorageError> {
        self.entries.lock().map_err(|_| StorageError::Io("memory store mutex poisoned".to_string()))
    }

    /// Builds the stored entry for a write.
    fn build_entry(current: Option<&StoredEntry>, value: Value, options: PutOptions) -> StoredEntry {
        let now = Timestamp::now();
        StoredEntry {
            value,
            version: next_version(current),
            metadata: options.metadata.unwrap_or_default(),
            expires_at: options.ttl.map(|ttl| now.saturating_add(ttl)),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let guard = self.lock()?;
        let now = Timestamp::now();
        Ok(guard.get(key).filter(|entry| !entry.is_expired(now)).map(|entry| entry.value.clone()))
    }

    fn put(&self, key: &str, value: Value, options: PutOptions) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let now = Timestamp::now();
        let current = guard.get(key).filter(|entry| !entry.is_expired(now));
        let entry = Self::build_entry(current, value, options);
        guard.insert(key.to_string(), entry);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.remove(key);
        Ok(())
    }

    fn list(&self, prefix: &str, options: ListOptions) -> Result<ListPage, StorageError> {
        let guard = self.lock()?;
        let now = Timestamp::now();
        let start = match options.cursor {
            Some(cursor) => Bound::Excluded(cursor),
            None => Bound::Included(prefix.to_string()),
        };
        let mut keys = Vec::new();
        let mut truncated = false;
        for (key, entry) in guard.range::<String, _>((start, Bound::Unbounded)) {
            if !key.starts_with(prefix) {
                break;
            }
            if entry.is_expired(now) {
                continue;
            }
            if let Some(limit) = options.limit
                && keys.len() >= limit
            {
                truncated = true;
                break;
            }
            keys.push(key.clone());
        }
        let cursor = if truncated { keys.last().cloned() } else { None };
        Ok(ListPage {
            keys,
            cursor,
            complete: !truncated,
        })
    }

    fn get_with_version(&self, key: &str) -> Result<Option<Versioned<Value>>, StorageError> {
        let guard = self.lock()?;
        let now = Timestamp::now();
        let versioned = guard
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .filter(|entry| entry.parsed_version().is_some())
            .map(|entry| Versioned {
                value: entry.value.clone(),
                version: entry.version.clone(),
            });
        Ok(versioned)
    }

    fn put_if_match(
        &self,
        key: &str,
        value: Value,
        expected_version: &str,
        options: PutOptions,
    ) -> Result<bool, StorageError> {
        let mut guard = self.lock()?;
        let now = Timestamp::now();
        let current = guard.get(key).filter(|entry| !entry.is_expired(now));
        let matches = match current {
            None => expects_missing(expected_version),
            Some(entry) => match entry.parsed_version() {
                Some(_) => entry.version == expected_version,
                // Untrusted version metadata never matches any expectation.
                None => false,
            },
        };
        if !matches {
            return Ok(false);
        }
        let entry = Self::build_entry(current, value, options);
        guard.insert(key.to_string(), entry);
        Ok(true)
    }
}
