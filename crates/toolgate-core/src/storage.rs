// crates/toolgate-core/src/storage.rs
// ============================================================================
// Module: Toolgate Storage Contract
// Description: Uniform key-value contract implemented by every backend.
// Purpose: Let application code run unchanged across the in-memory, file,
//          and remote object-store backends.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module defines the [`KeyValueStore`] trait, the option and page
//! types shared by its methods, a clonable [`SharedKeyValueStore`] wrapper,
//! and the [`ScopedStore`] namespace-prefix wrapper.
//!
//! Missing keys are `None`, not errors; version mismatches from
//! [`KeyValueStore::put_if_match`] are `false`, not errors. Callers can build
//! retry loops without exception-based control flow.
//!
//! ## Concurrency
//! Every method must be safe to call concurrently from unrelated requests
//! sharing one adapter instance. `put_if_match` guarantees only "this write
//! happens if nothing changed the version since my read"; it is a
//! read-then-write sequence and is **best-effort** on any backend whose
//! substrate is not serializable for single-key operations. Two concurrent
//! callers can both observe the same version and both "succeed", losing one
//! update. Backends built on a naturally serialized primitive may upgrade
//! this to a true guarantee; callers must not rely on that.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::entry::Versioned;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Storage engine errors.
///
/// Missing keys and version mismatches are not errors; these variants cover
/// malformed input and backend failures only.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The key is malformed for this backend (for example, it would escape
    /// a configured storage root).
    #[error("invalid key: {0}")]
    InvalidKey(String),
    /// The pagination cursor is not valid for this adapter instance.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
    /// Local I/O failure.
    #[error("storage io error: {0}")]
    Io(String),
    /// Remote backend failure.
    #[error("storage backend error: {0}")]
    Backend(String),
    /// Entry serialization or deserialization failure.
    #[error("storage serialization error: {0}")]
    Serialization(String),
    /// Entry exceeds the backend size limit.
    #[error("entry too large for key {key} ({actual_bytes} > {max_bytes})")]
    TooLarge {
        /// Offending key.
        key: String,
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual size in bytes.
        actual_bytes: usize,
    },
}

// ============================================================================
// SECTION: Options and Pages
// ============================================================================

/// Options for write operations.
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// Time-to-live for the entry. Expiry is enforced lazily: an expired
    /// entry reads as absent and is skipped by list, but its slot may not be
    /// proactively reclaimed.
    pub ttl: Option<Duration>,
    /// Caller metadata stored alongside the value. Never consulted for
    /// versioning.
    pub metadata: Option<BTreeMap<String, String>>,
}

/// Options for list operations.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Maximum number of keys to return.
    pub limit: Option<usize>,
    /// Opaque resume token from a previous page. Meaningful only to the
    /// adapter instance that produced it.
    pub cursor: Option<String>,
}

/// One page of keys from a list operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListPage {
    /// Keys in stable deterministic order for the snapshot.
    pub keys: Vec<String>,
    /// Resume token when more keys exist.
    pub cursor: Option<String>,
    /// False when more keys exist beyond the requested limit.
    pub complete: bool,
}

// ============================================================================
// SECTION: Storage Trait
// ============================================================================

/// Uniform versioned key-value contract implemented by every backend.
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under a key. Returns `None` for missing or
    /// expired keys; never errors on a miss.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] for malformed keys or backend failures.
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Writes a value, always incrementing the entry version.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] for malformed keys or backend failures.
    fn put(&self, key: &str, value: Value, options: PutOptions) -> Result<(), StorageError>;

    /// Deletes a key. Deleting a missing key is a no-op, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] for malformed keys or backend failures.
    fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Lists keys under a prefix in stable order with opaque-cursor
    /// pagination. Expired entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] for malformed input or backend failures.
    fn list(&self, prefix: &str, options: ListOptions) -> Result<ListPage, StorageError>;

    /// Reads a value together with its version. Returns `None` both when
    /// the key is absent and when the stored version metadata is missing or
    /// tampered: an untrustworthy entry must never default to version `"1"`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] for malformed keys or backend failures.
    fn get_with_version(&self, key: &str) -> Result<Option<Versioned<Value>>, StorageError>;

    /// Writes only if the current stored version equals `expected_version`.
    ///
    /// A missing key succeeds-as-create when `expected_version` is `"0"` or
    /// empty. Any mismatch returns `false` and leaves the store untouched.
    ///
    /// This is a read-then-write sequence: on backends without serializable
    /// single-key semantics the check is best-effort and concurrent writers
    /// can produce a lost update. Use [`crate::atomic_update`] for values
    /// that must reflect every concurrent update.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] for malformed keys or backend failures.
    fn put_if_match(
        &self,
        key: &str,
        value: Value,
        expected_version: &str,
        options: PutOptions,
    ) -> Result<bool, StorageError>;
}

// ============================================================================
// SECTION: Shared Store Wrapper
// ============================================================================

/// Shared key-value store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedKeyValueStore {
    /// Inner store implementation.
    inner: Arc<dyn KeyValueStore>,
}

impl SharedKeyValueStore {
    /// Wraps a store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl KeyValueStore + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wraps an existing shared store.
    #[must_use]
    pub const fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            inner: store,
        }
    }
}

impl KeyValueStore for SharedKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: Value, options: PutOptions) -> Result<(), StorageError> {
        self.inner.put(key, value, options)
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.inner.delete(key)
    }

    fn list(&self, prefix: &str, options: ListOptions) -> Result<ListPage, StorageError> {
        self.inner.list(prefix, options)
    }

    fn get_with_version(&self, key: &str) -> Result<Option<Versioned<Value>>, StorageError> {
        self.inner.get_with_version(key)
    }

    fn put_if_match(
        &self,
        key: &str,
        value: Value,
        expected_version: &str,
        options: PutOptions,
    ) -> Result<bool, StorageError> {
        self.inner.put_if_match(key, value, expected_version, options)
    }
}

// ============================================================================
// SECTION: Scoped Store
// ============================================================================

/// Namespace-prefixing wrapper around a shared store.
///
/// The prefix is silently prepended to all keys and stripped from all
/// returned keys, so multiple logical tenants can share one physical store
/// without key collisions. The wrapper is invisible to callers.
#[derive(Clone)]
pub struct ScopedStore {
    /// Underlying shared store.
    inner: SharedKeyValueStore,
    /// Namespace prefix prepended to every key.
    prefix: String,
}

impl ScopedStore {
    /// Creates a scoped view over a shared store.
    #[must_use]
    pub fn new(inner: SharedKeyValueStore, prefix: impl Into<String>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }

    /// Applies the namespace prefix to a logical key.
    fn physical_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Strips the namespace prefix from a physical key.
    fn logical_key(&self, key: &str) -> String {
        key.strip_prefix(&self.prefix).unwrap_or(key).to_string()
    }
}

impl KeyValueStore for ScopedStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        self.inner.get(&self.physical_key(key))
    }

    fn put(&self, key: &str, value: Value, options: PutOptions) -> Result<(), StorageError> {
        self.inner.put(&self.physical_key(key), value, options)
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.inner.delete(&self.physical_key(key))
    }

    fn list(&self, prefix: &str, options: ListOptions) -> Result<ListPage, StorageError> {
        let page = self.inner.list(&self.physical_key(prefix), options)?;
        let keys = page.keys.iter().map(|key| self.logical_key(key)).collect();
        Ok(ListPage {
            keys,
            cursor: page.cursor,
            complete: page.complete,
        })
    }

    fn get_with_version(&self, key: &str) -> Result<Option<Versioned<Value>>, StorageError> {
        self.inner.get_with_version(&self.physical_key(key))
    }

    fn put_if_match(
        &self,
        key: &str,
        value: Value,
        expected_version: &str,
        options: PutOptions,
    ) -> Result<bool, StorageError> {
        self.inner.put_if_match(&self.physical_key(key), value, expected_version, options)
    }
}
