// crates/toolgate-store-s3/src/store.rs
// ============================================================================
// Module: Remote Object Store
// Description: Key-value backend over an S3-compatible object store.
// Purpose: Persist versioned entries durably with strict key validation and
//          a blocking bridge over the async S3 client.
// Dependencies: toolgate-core, toolgate-config, aws-config, aws-sdk-s3, tokio
// ============================================================================

//! ## Overview
//! Each entry is one JSON object in the bucket. A configured prefix is
//! silently prepended to all keys and stripped from all returned keys. Keys
//! are validated lexically before any backend call.
//!
//! `put_if_match` is a read-then-write sequence against an eventually
//! consistent substrate; the optimistic check is best-effort and concurrent
//! writers can lose an update. Callers needing convergence should move the
//! contended key onto the in-memory backend or accept the retry-loop
//! semantics of `atomic_update`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;

use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::runtime::Runtime;
use tokio::runtime::RuntimeFlavor;
use toolgate_config::S3StoreConfig;
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
const MAX_KEY_LENGTH: usize = 1024;
/// Maximum serialized entry size accepted by the backend.
const MAX_ENTRY_BYTES: usize = 4 * 1024 * 1024;

// ============================================================================
// SECTION: Runtime Helpers
// ============================================================================

/// Blocks on an object-store future using a compatible runtime.
fn block_on_with_runtime<F, T>(runtime: &Runtime, future: F) -> Result<T, StorageError>
where
    F: Future<Output = Result<T, StorageError>> + Send + 'static,
    T: Send + 'static,
{
    if let Ok(handle) = Handle::try_current() {
        if matches!(handle.runtime_flavor(), RuntimeFlavor::MultiThread) {
            return tokio::task::block_in_place(|| handle.block_on(future));
        }
        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        std::thread::spawn(move || {
            let result = Runtime::new()
                .map_err(|err| StorageError::Io(err.to_string()))
                .and_then(|runtime| runtime.block_on(future));
            let _ = tx.send(result);
        });
        return rx
            .recv()
            .unwrap_or_else(|_| Err(StorageError::Io("object store thread join failed".to_string())));
    }

    runtime.block_on(future)
}

// ============================================================================
// SECTION: Object Client
// ============================================================================

/// One page of physical object keys.
pub(crate) struct ObjectPage {
    /// Physical keys in listing order.
    pub keys: Vec<String>,
    /// Continuation token when the listing is truncated.
    pub next_token: Option<String>,
}

/// Minimal object-store client abstraction.
pub(crate) trait ObjectClient: Send + Sync {
    /// Reads an object, returning `None` when it does not exist.
    fn get(&self, key: &str, max_bytes: usize) -> Result<Option<Vec<u8>>, StorageError>;
    /// Writes an object.
    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError>;
    /// Deletes an object. Missing objects are not an error.
    fn delete(&self, key: &str) -> Result<(), StorageError>;
    /// Lists one page of keys under a physical prefix.
    fn list_page(&self, prefix: &str, token: Option<String>) -> Result<ObjectPage, StorageError>;
}

/// S3-backed object client.
struct S3ObjectClient {
    /// Underlying S3 client.
    client: Client,
    /// Bucket name.
    bucket: String,
    /// Tokio runtime for blocking S3 operations.
    runtime: Option<Arc<Runtime>>,
}

impl Drop for S3ObjectClient {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            let _ = std::thread::spawn(move || drop(runtime));
        }
    }
}

impl S3ObjectClient {
    /// Builds a new S3-backed client from backend settings.
    fn new(config: &S3StoreConfig) -> Result<Self, StorageError> {
        config.validate().map_err(|err| StorageError::Backend(err.to_string()))?;
        let runtime = Runtime::new().map_err(|err| StorageError::Io(err.to_string()))?;
        let region = config.region.clone();
        let endpoint = config.endpoint.clone();
        let shared_config = block_on_with_runtime(&runtime, async {
            let mut loader = aws_config::defaults(BehaviorVersion::latest());
            if let Some(region) = region {
                loader = loader.region(Region::new(region));
            }
            if let Some(endpoint) = endpoint {
                loader = loader.endpoint_url(endpoint);
            }
            Ok(loader.load().await)
        })?;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared_config);
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }
        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            runtime: Some(Arc::new(runtime)),
        })
    }

    /// Returns the runtime or an error if shutdown.
    fn runtime(&self) -> Result<&Runtime, StorageError> {
        self.runtime
            .as_ref()
            .map(AsRef::as_ref)
            .ok_or_else(|| StorageError::Io("object store runtime closed".to_string()))
    }
}

impl ObjectClient for S3ObjectClient {
    fn get(&self, key: &str, max_bytes: usize) -> Result<Option<Vec<u8>>, StorageError> {
        let bucket = self.bucket.clone();
        let key = key.to_string();
        let client = self.client.clone();
        block_on_with_runtime(self.runtime()?, async move {
            let output = match client.get_object().bucket(bucket).key(key.clone()).send().await {
                Ok(output) => output,
                Err(err) => {
                    let service = err.into_service_error();
                    if service.is_no_such_key() {
                        return Ok(None);
                    }
                    return Err(StorageError::Backend(service.to_string()));
                }
            };
            let bytes = output
                .body
                .collect()
                .await
                .map_err(|err| StorageError::Io(err.to_string()))?
                .into_bytes();
            if bytes.len() > max_bytes {
                return Err(StorageError::TooLarge {
                    key,
                    max_bytes,
                    actual_bytes: bytes.len(),
                });
            }
            Ok(Some(bytes.to_vec()))
        })
    }

    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let bucket = self.bucket.clone();
        let key = key.to_string();
        let client = self.client.clone();
        block_on_with_runtime(self.runtime()?, async move {
            client
                .put_object()
                .bucket(bucket)
                .key(key)
                .content_type("application/json")
                .body(ByteStream::from(bytes))
                .send()
                .await
                .map_err(|err| StorageError::Backend(err.to_string()))?;
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let bucket = self.bucket.clone();
        let key = key.to_string();
        let client = self.client.clone();
        block_on_with_runtime(self.runtime()?, async move {
            client
                .delete_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(|err| StorageError::Backend(err.to_string()))?;
            Ok(())
        })
    }

    fn list_page(&self, prefix: &str, token: Option<String>) -> Result<ObjectPage, StorageError> {
        let bucket = self.bucket.clone();
        let prefix = prefix.to_string();
        let client = self.client.clone();
        block_on_with_runtime(self.runtime()?, async move {
            let output = client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .set_continuation_token(token)
                .send()
                .await
                .map_err(|err| StorageError::Backend(err.to_string()))?;
            let keys = output
                .contents()
                .iter()
                .filter_map(|object| object.key().map(str::to_string))
                .collect();
            let next_token = if output.is_truncated().unwrap_or(false) {
                output.next_continuation_token().map(str::to_string)
            } else {
                None
            };
            Ok(ObjectPage {
                keys,
                next_token,
            })
        })
    }
}

// ============================================================================
// SECTION: Remote Store
// ============================================================================

/// Remote durable key-value store over an S3-compatible bucket.
pub struct RemoteStore {
    /// Object client implementation.
    client: Arc<dyn ObjectClient>,
    /// Normalized key prefix inside the bucket (empty or `…/`-terminated).
    prefix: String,
}

impl RemoteStore {
    /// Builds a remote store from backend settings.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when settings are invalid or the client
    /// cannot be initialized.
    pub fn from_config(config: &S3StoreConfig) -> Result<Self, StorageError> {
        let prefix = normalize_prefix(config.prefix.as_deref().unwrap_or(""))?;
        Ok(Self {
            client: Arc::new(S3ObjectClient::new(config)?),
            prefix,
        })
    }

    /// Builds a remote store from a custom client (tests only).
    #[cfg(test)]
    pub(crate) fn from_client(client: Arc<dyn ObjectClient>, prefix: &str) -> Self {
        Self {
            client,
            prefix: prefix.to_string(),
        }
    }

    /// Applies the configured prefix to a logical key.
    fn physical_key(&self, key: &str) -> Result<String, StorageError> {
        validate_key(key)?;
        Ok(format!("{}{}", self.prefix, key))
    }

    /// Strips the configured prefix from a physical key.
    fn logical_key(&self, key: &str) -> String {
        key.strip_prefix(&self.prefix).unwrap_or(key).to_string()
    }

    /// Reads and parses the entry document for a logical key.
    fn read_entry(&self, key: &str) -> Result<Option<StoredEntry>, StorageError> {
        let physical = self.physical_key(key)?;
        let bytes = self.client.get(&physical, MAX_ENTRY_BYTES)?;
        match bytes {
            None => Ok(None),
            Some(bytes) => {
                let entry = serde_json::from_slice(&bytes)
                    .map_err(|err| StorageError::Serialization(err.to_string()))?;
                Ok(Some(entry))
            }
        }
    }

    /// Serializes and writes the entry document for a logical key.
    fn write_entry(&self, key: &str, entry: &StoredEntry) -> Result<(), StorageError> {
        let physical = self.physical_key(key)?;
        let bytes = serde_json::to_vec(entry)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        if bytes.len() > MAX_ENTRY_BYTES {
            return Err(StorageError::TooLarge {
                key: key.to_string(),
                max_bytes: MAX_ENTRY_BYTES,
                actual_bytes: bytes.len(),
            });
        }
        self.client.put(&physical, bytes)
    }
}

impl KeyValueStore for RemoteStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let now = Timestamp::now();
        Ok(self
            .read_entry(key)?
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value))
    }

    fn put(&self, key: &str, value: Value, options: PutOptions) -> Result<(), StorageError> {
        let now = Timestamp::now();
        let current = self.read_entry(key)?.filter(|entry| !entry.is_expired(now));
        let entry = StoredEntry {
            value,
            version: next_version(current.as_ref()),
            metadata: options.metadata.unwrap_or_default(),
            expires_at: options.ttl.map(|ttl| now.saturating_add(ttl)),
        };
        self.write_entry(key, &entry)
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let physical = self.physical_key(key)?;
        self.client.delete(&physical)
    }

    fn list(&self, prefix: &str, options: ListOptions) -> Result<ListPage, StorageError> {
        validate_prefix(prefix)?;
        let now = Timestamp::now();
        let physical_prefix = format!("{}{}", self.prefix, prefix);
        let mut keys = Vec::new();
        let mut truncated = false;
        let mut token: Option<String> = None;
        'pages: loop {
            let page = self.client.list_page(&physical_prefix, token.take())?;
            for physical in page.keys {
                let key = self.logical_key(&physical);
                if let Some(cursor) = options.cursor.as_deref()
                    && key.as_str() <= cursor
                {
                    continue;
                }
                let expired =
                    self.read_entry(&key)?.is_none_or(|entry| entry.is_expired(now));
                if expired {
                    continue;
                }
                if let Some(limit) = options.limit
                    && keys.len() >= limit
                {
                    truncated = true;
                    break 'pages;
                }
                keys.push(key);
            }
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
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
        // Read-then-write: best-effort on this substrate, per the contract.
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
        Ok(true)
    }
}

// ============================================================================
// SECTION: Key Validation
// ============================================================================

/// Validates a logical key lexically before any backend call.
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

/// Validates a list prefix (an empty prefix is allowed).
fn validate_prefix(prefix: &str) -> Result<(), StorageError> {
    if prefix.is_empty() {
        return Ok(());
    }
    if prefix.contains('\\') || prefix.starts_with('/') || prefix.contains("..") {
        return Err(StorageError::InvalidKey("prefix is invalid".to_string()));
    }
    Ok(())
}

/// Normalizes a configured bucket prefix.
fn normalize_prefix(raw: &str) -> Result<String, StorageError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    if trimmed.starts_with('/') {
        return Err(StorageError::InvalidKey(
            "prefix must be relative (no leading slash)".to_string(),
        ));
    }
    let normalized = trimmed.strip_suffix('/').unwrap_or(trimmed);
    Ok(format!("{normalized}/"))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
