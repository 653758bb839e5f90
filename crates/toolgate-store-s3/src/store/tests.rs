// crates/toolgate-store-s3/src/store/tests.rs
// ============================================================================
// Module: Remote Store Tests
// Description: Contract tests for the remote store over an in-memory client.
// Purpose: Exercise entry serialization, prefixing, versioning, TTL, and
//          pagination without a live bucket.
// Dependencies: toolgate-core, serde_json
// ============================================================================

//! Remote store tests against an in-memory object client.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions use unwrap for clarity."
)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::json;
use toolgate_core::KeyValueStore;
use toolgate_core::ListOptions;
use toolgate_core::PutOptions;
use toolgate_core::StorageError;

use super::MAX_ENTRY_BYTES;
use super::ObjectClient;
use super::ObjectPage;
use super::RemoteStore;
use super::normalize_prefix;

/// In-memory object client with a tunable listing page size.
struct InMemoryObjectClient {
    /// Stored objects keyed by physical key.
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    /// Maximum keys returned per listing page.
    page_size: usize,
}

impl InMemoryObjectClient {
    /// Creates an empty client with the given listing page size.
    fn new(page_size: usize) -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            page_size,
        }
    }
}

impl ObjectClient for InMemoryObjectClient {
    fn get(&self, key: &str, max_bytes: usize) -> Result<Option<Vec<u8>>, StorageError> {
        let objects = self.objects.lock().unwrap();
        match objects.get(key) {
            None => Ok(None),
            Some(bytes) if bytes.len() > max_bytes => Err(StorageError::TooLarge {
                key: key.to_string(),
                max_bytes,
                actual_bytes: bytes.len(),
            }),
            Some(bytes) => Ok(Some(bytes.clone())),
        }
    }

    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    fn list_page(&self, prefix: &str, token: Option<String>) -> Result<ObjectPage, StorageError> {
        let objects = self.objects.lock().unwrap();
        let mut keys: Vec<String> = objects
            .keys()
            .filter(|key| key.starts_with(prefix))
            .filter(|key| token.as_deref().is_none_or(|token| key.as_str() > token))
            .take(self.page_size + 1)
            .cloned()
            .collect();
        let next_token = if keys.len() > self.page_size {
            keys.truncate(self.page_size);
            keys.last().cloned()
        } else {
            None
        };
        Ok(ObjectPage {
            keys,
            next_token,
        })
    }
}

/// Builds a remote store over a fresh in-memory client.
fn store_with_prefix(prefix: &str) -> RemoteStore {
    RemoteStore::from_client(Arc::new(InMemoryObjectClient::new(100)), prefix)
}

#[test]
fn missing_key_reads_as_none() {
    let store = store_with_prefix("");
    assert!(store.get("absent").unwrap().is_none());
    assert!(store.get_with_version("absent").unwrap().is_none());
}

#[test]
fn put_increments_version_per_write() {
    let store = store_with_prefix("");
    store.put("counter", json!(1), PutOptions::default()).unwrap();
    store.put("counter", json!(2), PutOptions::default()).unwrap();
    store.put("counter", json!(3), PutOptions::default()).unwrap();
    let versioned = store.get_with_version("counter").unwrap().unwrap();
    assert_eq!(versioned.value, json!(3));
    assert_eq!(versioned.version, "3");
}

#[test]
fn configured_prefix_is_invisible_to_callers() {
    let client = Arc::new(InMemoryObjectClient::new(100));
    let store = RemoteStore::from_client(Arc::clone(&client) as Arc<dyn ObjectClient>, "tenant/");
    store.put("doc/a", json!("a"), PutOptions::default()).unwrap();

    let physical: Vec<String> =
        client.objects.lock().unwrap().keys().cloned().collect();
    assert_eq!(physical, vec!["tenant/doc/a".to_string()]);

    assert_eq!(store.get("doc/a").unwrap(), Some(json!("a")));
    let page = store.list("doc/", ListOptions::default()).unwrap();
    assert_eq!(page.keys, vec!["doc/a".to_string()]);
}

#[test]
fn tampered_version_metadata_reads_as_none_with_version() {
    let client = Arc::new(InMemoryObjectClient::new(100));
    let store = RemoteStore::from_client(Arc::clone(&client) as Arc<dyn ObjectClient>, "");
    store.put("doc", json!("x"), PutOptions::default()).unwrap();

    // Corrupt the version field in the stored document.
    let raw = client.objects.lock().unwrap().get("doc").cloned().unwrap();
    let mut entry: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    entry["version"] = json!("not-a-number");
    client
        .put("doc", serde_json::to_vec(&entry).unwrap())
        .unwrap();

    assert!(store.get_with_version("doc").unwrap().is_none());
    // Plain reads still return the value.
    assert_eq!(store.get("doc").unwrap(), Some(json!("x")));
    // Conditional writes never match an untrusted version.
    let matched = store
        .put_if_match("doc", json!("y"), "not-a-number", PutOptions::default())
        .unwrap();
    assert!(!matched);
}

#[test]
fn tampered_version_restarts_numbering_on_plain_put() {
    let client = Arc::new(InMemoryObjectClient::new(100));
    let store = RemoteStore::from_client(Arc::clone(&client) as Arc<dyn ObjectClient>, "");
    store.put("doc", json!("x"), PutOptions::default()).unwrap();

    let raw = client.objects.lock().unwrap().get("doc").cloned().unwrap();
    let mut entry: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    entry["version"] = json!("");
    client
        .put("doc", serde_json::to_vec(&entry).unwrap())
        .unwrap();

    store.put("doc", json!("y"), PutOptions::default()).unwrap();
    let versioned = store.get_with_version("doc").unwrap().unwrap();
    assert_eq!(versioned.version, "1");
}

#[test]
fn put_if_match_creates_only_on_missing_sentinel() {
    let store = store_with_prefix("");
    assert!(store.put_if_match("doc", json!("a"), "0", PutOptions::default()).unwrap());
    assert!(!store.put_if_match("doc", json!("b"), "", PutOptions::default()).unwrap());
    assert!(!store.put_if_match("doc", json!("b"), "0", PutOptions::default()).unwrap());
    assert!(store.put_if_match("doc", json!("b"), "1", PutOptions::default()).unwrap());
    let versioned = store.get_with_version("doc").unwrap().unwrap();
    assert_eq!(versioned.value, json!("b"));
    assert_eq!(versioned.version, "2");
}

#[test]
fn put_if_match_mismatch_leaves_entry_untouched() {
    let store = store_with_prefix("");
    store.put("doc", json!("original"), PutOptions::default()).unwrap();
    let matched = store
        .put_if_match("doc", json!("clobber"), "99", PutOptions::default())
        .unwrap();
    assert!(!matched);
    let versioned = store.get_with_version("doc").unwrap().unwrap();
    assert_eq!(versioned.value, json!("original"));
    assert_eq!(versioned.version, "1");
}

#[test]
fn expired_entries_read_as_absent_and_are_skipped_by_list() {
    let store = store_with_prefix("");
    let short = PutOptions {
        ttl: Some(Duration::from_millis(1)),
        metadata: None,
    };
    store.put("perishable", json!("gone"), short).unwrap();
    store.put("durable", json!("kept"), PutOptions::default()).unwrap();
    std::thread::sleep(Duration::from_millis(10));

    assert!(store.get("perishable").unwrap().is_none());
    assert!(store.get_with_version("perishable").unwrap().is_none());
    let page = store.list("", ListOptions::default()).unwrap();
    assert_eq!(page.keys, vec!["durable".to_string()]);
}

#[test]
fn expired_entry_slot_accepts_create_sentinel() {
    let store = store_with_prefix("");
    let short = PutOptions {
        ttl: Some(Duration::from_millis(1)),
        metadata: None,
    };
    store.put("slot", json!("old"), short).unwrap();
    std::thread::sleep(Duration::from_millis(10));
    assert!(store.put_if_match("slot", json!("new"), "0", PutOptions::default()).unwrap());
    assert_eq!(store.get("slot").unwrap(), Some(json!("new")));
}

#[test]
fn list_paginates_across_client_pages() {
    let store = RemoteStore::from_client(Arc::new(InMemoryObjectClient::new(2)), "");
    for name in ["a", "b", "c", "d", "e"] {
        store.put(&format!("item/{name}"), json!(name), PutOptions::default()).unwrap();
    }

    let first = store
        .list(
            "item/",
            ListOptions {
                limit: Some(3),
                cursor: None,
            },
        )
        .unwrap();
    assert_eq!(first.keys, vec!["item/a", "item/b", "item/c"]);
    assert!(!first.complete);

    let second = store
        .list(
            "item/",
            ListOptions {
                limit: Some(3),
                cursor: first.cursor,
            },
        )
        .unwrap();
    assert_eq!(second.keys, vec!["item/d", "item/e"]);
    assert!(second.complete);
    assert!(second.cursor.is_none());
}

#[test]
fn delete_is_idempotent() {
    let store = store_with_prefix("");
    store.put("doc", json!(1), PutOptions::default()).unwrap();
    store.delete("doc").unwrap();
    store.delete("doc").unwrap();
    assert!(store.get("doc").unwrap().is_none());
}

#[test]
fn malformed_keys_are_rejected_lexically() {
    let store = store_with_prefix("");
    for key in ["", "/absolute", "a//b", "a/../b", "..", "a\\b", "."] {
        let result = store.get(key);
        assert!(matches!(result, Err(StorageError::InvalidKey(_))), "key {key:?} should be rejected");
    }
}

#[test]
fn oversized_entry_is_rejected_before_write() {
    let client = Arc::new(InMemoryObjectClient::new(100));
    let store = RemoteStore::from_client(Arc::clone(&client) as Arc<dyn ObjectClient>, "");
    let huge = "x".repeat(MAX_ENTRY_BYTES + 1);
    let result = store.put("doc", json!(huge), PutOptions::default());
    assert!(matches!(result, Err(StorageError::TooLarge { .. })));
    assert!(client.objects.lock().unwrap().is_empty());
}

#[test]
fn normalize_prefix_trims_and_terminates() {
    assert_eq!(normalize_prefix("").unwrap(), "");
    assert_eq!(normalize_prefix("  ").unwrap(), "");
    assert_eq!(normalize_prefix("tenant").unwrap(), "tenant/");
    assert_eq!(normalize_prefix("tenant/").unwrap(), "tenant/");
    assert!(normalize_prefix("/tenant").is_err());
}
