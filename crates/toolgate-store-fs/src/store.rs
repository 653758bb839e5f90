// crates/toolgate-store-fs/src/store.rs
// ============================================================================
// Module: File Store
// Description: Local-disk key-value backend over a nested JSON-file tree.
// Purpose: Provide durable single-host storage implementing the core
//          contract with strict path validation.
// Dependencies: toolgate-core, serde_json
// ============================================================================

//! ## Overview
//! Each logical key maps to one JSON document under the store root: key
//! segments (split on `/`) become directories and the final segment becomes a
//! `.json` file. Keys are validated lexically before any filesystem access;
//! traversal segments, absolute paths, and oversize components are rejected
//! synchronously.
//!
//! Read-modify-write sequences are serialized per store instance with a
//! process-local mutex, so `put_if_match` holds within one process. Across
//! processes sharing a root the contract remains best-effort, as documented
//! on the trait. Writes land in a staging file and are renamed over the
//! entry document, so lock-free readers never observe a partial write.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use serde_json::Value;
use toolgate_core::KeyValueStore;
use toolgate_core::ListOptions;
use toolgate_core::ListPage;
use toolgate_core::PutOptions;
use toolgate_core::StorageError;
use toolgate_core::Timestamp;
use toolgate_core::Versioned;
use toolgate_core::entry::StoredEntry;
use toolgate_core::entry::expects_missing;
use toolgate_core::entry::next_version;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum length of a single key segment.
const MAX_KEY_SEGMENT_LENGTH: usize = 255;
/// Maximum total key length.
const MAX_KEY_LENGTH: usize = 4096;
/// File suffix for entry documents.
const ENTRY_SUFFIX: &str = ".json";
/// File suffix for in-flight writes awaiting rename.
const STAGING_SUFFIX: &str = ".tmp";

// ============================================================================
// SECTION: File Store
// ============================================================================

/// Local-disk key-value store rooted at a directory.
pub struct FileStore {
    /// Root directory holding all entry documents.
    root: PathBuf,
    /// Serializes read-modify-write sequences within this process.
    write_lock: Arc<Mutex<()>>,
}

impl FileStore {
    /// Creates a file store rooted at the given directory, creating it when
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the root cannot be created.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|err| StorageError::Io(format!("unable to create store root: {err}")))?;
        Ok(Self {
            root,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Acquires the write lock, surfacing poisoning as a storage error.
    fn lock_writes(&self) -> Result<MutexGuard<'_, ()>, StorageError> {
        self.write_lock
            .lock()
            .map_err(|_| StorageError::Io("file store mutex poisoned".to_string()))
    }

    /// Translates a logical key into its document path.
    ///
    /// Validation is purely lexical and happens before any filesystem
    /// access: traversal segments, absolute paths, backslashes, and oversize
    /// keys are all rejected here.
    fn entry_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        let mut path = self.root.clone();
        let mut segments = key.split('/').peekable();
        while let Some(segment) = segments.next() {
            if segments.peek().is_some() {
                path.push(segment);
            } else {
                path.push(format!("{segment}{ENTRY_SUFFIX}"));
            }
        }
        Ok(path)
    }

    /// Reads the entry document for a key, if present.
    fn read_entry(&self, key: &str) -> Result<Option<StoredEntry>, StorageError> {
        let path = self.entry_path(key)?;
        read_entry_at(&path)
    }

    /// Writes the entry document for a key.
    ///
    /// The document is written to a temporary sibling and renamed into
    /// place, so unguarded readers always see a complete old or new
    /// document and never a truncated one.
    fn write_entry(&self, key: &str, entry: &StoredEntry) -> Result<(), StorageError> {
        let path = self.entry_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| StorageError::Io(format!("unable to create key directory: {err}")))?;
        }
        let bytes = serde_json::to_vec(entry)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        let mut staging = path.clone().into_os_string();
        staging.push(STAGING_SUFFIX);
        let staging = PathBuf::from(staging);
        fs::write(&staging, bytes)
            .map_err(|err| StorageError::Io(format!("unable to write entry: {err}")))?;
        fs::rename(&staging, &path)
            .map_err(|err| StorageError::Io(format!("unable to commit entry: {err}")))
    }

    /// Collects every logical key under the root, sorted.
    fn collect_keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        collect_keys_under(&self.root, String::new(), &mut keys)?;
        keys.sort();
        Ok(keys)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let now = Timestamp::now();
        Ok(self
            .read_entry(key)?
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value))
    }

    fn put(&self, key: &str, value: Value, options: PutOptions) -> Result<(), StorageError> {
        let guard = self.lock_writes()?;
        let now = Timestamp::now();
        let current = self.read_entry(key)?.filter(|entry| !entry.is_expired(now));
        let entry = StoredEntry {
            value,
            version: next_version(current.as_ref()),
            metadata: options.metadata.unwrap_or_default(),
            expires_at: options.ttl.map(|ttl| now.saturating_add(ttl)),
        };
        self.write_entry(key, &entry)?;
        drop(guard);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.entry_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::Io(format!("unable to delete entry: {err}"))),
        }
    }

    fn list(&self, prefix: &str, options: ListOptions) -> Result<ListPage, StorageError> {
        let now = Timestamp::now();
        let all_keys = self.collect_keys()?;
        let mut keys = Vec::new();
        let mut truncated = false;
        for key in all_keys {
            if !key.starts_with(prefix) {
                continue;
            }
            if let Some(cursor) = options.cursor.as_deref()
                && key.as_str() <= cursor
            {
                continue;
            }
            let expired = self.read_entry(&key)?.is_none_or(|entry| entry.is_expired(now));
            if expired {
                continue;
            }
            if let Some(limit) = options.limit
                && keys.len() >= limit
            {
                truncated = true;
                break;
            }
            keys.push(key);
        }
        let cursor = if truncated { keys.last().cloned() } else { None };
        Ok(ListPage {
            keys,
            cursor,
            complete: !truncated,
        })
    }

    fn get_with_version(&self, key: &str) -> Result<Option<Versioned<Value>>, StorageError> {
        let now = Timestamp::now();
        Ok(self
            .read_entry(key)?
            .filter(|entry| !entry.is_expired(now))
            .filter(|entry| entry.parsed_version().is_some())
            .map(|entry| Versioned {
                value: entry.value,
                version: entry.version,
            }))
    }

    fn put_if_match(
        &self,
        key: &str,
        value: Value,
        expected_version: &str,
        options: PutOptions,
    ) -> Result<bool, StorageError> {
        let guard = self.lock_writes()?;
        let now = Timestamp::now();
        let current = self.read_entry(key)?.filter(|entry| !entry.is_expired(now));
        let matches = match current.as_ref() {
            None => expects_missing(expected_version),
            Some(entry) => match entry.parsed_version() {
                Some(_) => entry.version == expected_version,
                None => false,
            },
        };
        if !matches {
            return Ok(false);
        }
        let entry = StoredEntry {
            value,
            version: next_version(current.as_ref()),
            metadata: options.metadata.unwrap_or_default(),
            expires_at: options.ttl.map(|ttl| now.saturating_add(ttl)),
        };
        self.write_entry(key, &entry)?;
        drop(guard);
        Ok(true)
    }
}

// ============================================================================
// SECTION: Key Validation
// ============================================================================

/// Validates a logical key lexically before any filesystem access.
fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("key must not be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(StorageError::InvalidKey("key exceeds length limit".to_string()));
    }
    if key.contains('\\') {
        return Err(StorageError::InvalidKey("key must not contain backslashes".to_string()));
    }
    if key.starts_with('/') {
        return Err(StorageError::InvalidKey("key must be relative".to_string()));
    }
    for segment in key.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(StorageError::InvalidKey("key segment is invalid".to_string()));
        }
        if segment.len() > MAX_KEY_SEGMENT_LENGTH {
            return Err(StorageError::InvalidKey("key segment exceeds length limit".to_string()));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Filesystem Helpers
// ============================================================================

/// Reads and parses the entry document at a path, if present.
fn read_entry_at(path: &Path) -> Result<Option<StoredEntry>, StorageError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(StorageError::Io(format!("unable to read entry: {err}"))),
    };
    let entry = serde_json::from_slice(&bytes)
        .map_err(|err| StorageError::Serialization(err.to_string()))?;
    Ok(Some(entry))
}

/// Recursively collects logical keys under a directory.
fn collect_keys_under(
    dir: &Path,
    key_prefix: String,
    keys: &mut Vec<String>,
) -> Result<(), StorageError> {
    let reader = match fs::read_dir(dir) {
        Ok(reader) => reader,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(StorageError::Io(format!("unable to list entries: {err}"))),
    };
    for item in reader {
        let item = item.map_err(|err| StorageError::Io(format!("unable to list entries: {err}")))?;
        let name = item.file_name().to_string_lossy().to_string();
        let path = item.path();
        if path.is_dir() {
            let nested = if key_prefix.is_empty() {
                format!("{name}/")
            } else {
                format!("{key_prefix}{name}/")
            };
            collect_keys_under(&path, nested, keys)?;
        } else if let Some(stem) = name.strip_suffix(ENTRY_SUFFIX) {
            keys.push(format!("{key_prefix}{stem}"));
        }
    }
    Ok(())
}
