// crates/toolgate-mcp/src/auth.rs
// ============================================================================
// Module: Authentication Subsystem
// Description: Credential hashing, identity index, and key validation.
// Purpose: Resolve caller identity fail-closed without ever persisting or
//          propagating raw credentials.
// Dependencies: rand, serde, serde_json, thiserror, toolgate-config,
//               toolgate-core
// ============================================================================

//! ## Overview
//! Raw credentials arrive on every request and are never persisted. Two
//! checks exist: a constant-time comparison against a single configured
//! admin secret, and a user-key check that hashes the credential (SHA-256)
//! and resolves it either through a hash-to-identity index stored in the
//! key-value engine (O(1), preferred) or through a budget-capped linear
//! scan over a configured fallback list when indexing is disabled.
//!
//! The fallback scan caps both requests-per-window and total
//! comparisons-per-window. When either budget is exhausted the validator
//! denies; authentication must not become a denial-of-service vector.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use toolgate_config::AuthConfig;
use toolgate_core::KeyValueStore;
use toolgate_core::PutOptions;
use toolgate_core::SharedKeyValueStore;
use toolgate_core::StorageError;
use toolgate_core::Timestamp;
use toolgate_core::constant_time_eq_str;
use toolgate_core::sha256_hex;

use crate::audit::AuditSink;
use crate::audit::AuthAuditEvent;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Storage key prefix for the hash-to-identity index.
pub const AUTH_INDEX_PREFIX: &str = "_authidx:";

/// Length of generated credential tokens in characters.
const TOKEN_LENGTH: usize = 48;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Authentication subsystem errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Underlying storage failure.
    #[error("auth storage error: {0}")]
    Storage(#[from] StorageError),
    /// Index entry serialization failure.
    #[error("auth serialization error: {0}")]
    Serialization(String),
}

// ============================================================================
// SECTION: Index Entries
// ============================================================================

/// Identity record stored keyed by the SHA-256 hash of the raw credential.
///
/// The raw credential itself is never stored; possession of the index entry
/// does not allow reconstructing a usable key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthIndexEntry {
    /// Stable user identifier (the credential hash at provisioning time).
    pub user_id: String,
    /// Display name when provided.
    #[serde(default)]
    pub name: Option<String>,
    /// Contact email when provided.
    #[serde(default)]
    pub email: Option<String>,
    /// Whether the user has admin privileges.
    #[serde(default)]
    pub is_admin: bool,
    /// Provisioning timestamp.
    pub created_at: Timestamp,
}

/// Raw token and derived identity returned from provisioning.
///
/// The raw key is returned exactly once; it cannot be retrieved again
/// because it is never stored.
#[derive(Debug, Clone)]
pub struct ProvisionedUser {
    /// Stable user identifier.
    pub user_id: String,
    /// Raw credential token.
    pub raw_key: String,
}

// ============================================================================
// SECTION: Validation Result
// ============================================================================

/// Outcome of validating a raw credential.
#[derive(Debug, Clone)]
pub struct KeyValidation {
    /// Whether the credential validated.
    pub valid: bool,
    /// Resolved user identifier when known.
    pub user_id: Option<String>,
    /// Whether the caller has admin privileges.
    pub is_admin: bool,
    /// Whether the server is running in debug mode.
    pub debug_mode: bool,
    /// Denial reason when invalid.
    pub error: Option<String>,
}

impl KeyValidation {
    /// Builds a denied validation with a reason.
    fn denied(debug_mode: bool, error: &str) -> Self {
        Self {
            valid: false,
            user_id: None,
            is_admin: false,
            debug_mode,
            error: Some(error.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Scan Budget
// ============================================================================

/// Per-window accounting for the fallback linear scan.
#[derive(Debug, Clone, Copy)]
struct ScanWindow {
    /// Start of the current accounting window.
    window_start: Timestamp,
    /// Requests consumed in the current window.
    requests: u64,
    /// Comparisons consumed in the current window.
    comparisons: u64,
}

impl ScanWindow {
    /// Builds a fresh window starting now.
    fn fresh(now: Timestamp) -> Self {
        Self {
            window_start: now,
            requests: 0,
            comparisons: 0,
        }
    }
}

// ============================================================================
// SECTION: Key Validator
// ============================================================================

/// Credential validator over the storage-backed identity index.
pub struct KeyValidator {
    /// Auth settings.
    config: AuthConfig,
    /// Storage handle for the identity index.
    store: SharedKeyValueStore,
    /// Whether the server runs in debug mode.
    debug_mode: bool,
    /// Audit sink for auth decisions.
    audit: Arc<dyn AuditSink>,
    /// Fallback scan accounting state.
    scan_state: Mutex<ScanWindow>,
}

impl KeyValidator {
    /// Creates a validator over a storage handle.
    #[must_use]
    pub fn new(
        config: AuthConfig,
        store: SharedKeyValueStore,
        debug_mode: bool,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            config,
            store,
            debug_mode,
            audit,
            scan_state: Mutex::new(ScanWindow::fresh(Timestamp::now())),
        }
    }

    /// Returns the storage key for an index entry.
    #[must_use]
    pub fn index_key(credential_hash: &str) -> String {
        format!("{AUTH_INDEX_PREFIX}{credential_hash}")
    }

    /// Validates a raw credential and resolves the caller identity.
    ///
    /// The admin-secret check runs first, then the indexed lookup (or the
    /// budget-capped fallback scan when indexing is disabled). The raw
    /// credential never leaves this function; only its hash is carried
    /// forward.
    #[must_use]
    pub fn validate_key(&self, raw_key: &str) -> KeyValidation {
        let credential_hash = sha256_hex(raw_key.as_bytes());

        if let Some(secret) = self.config.admin_secret.as_deref()
            && constant_time_eq_str(raw_key, secret)
        {
            self.audit.record_auth(&AuthAuditEvent::new(
                true,
                "admin_secret",
                credential_hash,
                None,
                None,
            ));
            return KeyValidation {
                valid: true,
                user_id: None,
                is_admin: true,
                debug_mode: self.debug_mode,
                error: None,
            };
        }

        if self.config.index_enabled {
            self.validate_indexed(&credential_hash)
        } else {
            self.validate_fallback(raw_key, &credential_hash)
        }
    }

    /// Resolves a credential hash through the identity index.
    fn validate_indexed(&self, credential_hash: &str) -> KeyValidation {
        let entry = match self.store.get(&Self::index_key(credential_hash)) {
            Ok(Some(value)) => match serde_json::from_value::<AuthIndexEntry>(value) {
                Ok(entry) => entry,
                Err(_) => {
                    self.audit.record_auth(&AuthAuditEvent::new(
                        false,
                        "index",
                        credential_hash.to_string(),
                        None,
                        Some("corrupt_index_entry"),
                    ));
                    return KeyValidation::denied(self.debug_mode, "credential index entry is corrupt");
                }
            },
            Ok(None) => {
                self.audit.record_auth(&AuthAuditEvent::new(
                    false,
                    "index",
                    credential_hash.to_string(),
                    None,
                    Some("unknown_credential"),
                ));
                return KeyValidation::denied(self.debug_mode, "unknown credential");
            }
            Err(_) => {
                self.audit.record_auth(&AuthAuditEvent::new(
                    false,
                    "index",
                    credential_hash.to_string(),
                    None,
                    Some("storage_error"),
                ));
                return KeyValidation::denied(self.debug_mode, "credential lookup failed");
            }
        };
        self.audit.record_auth(&AuthAuditEvent::new(
            true,
            "index",
            credential_hash.to_string(),
            Some(entry.user_id.clone()),
            None,
        ));
        KeyValidation {
            valid: true,
            user_id: Some(entry.user_id),
            is_admin: entry.is_admin,
            debug_mode: self.debug_mode,
            error: None,
        }
    }

    /// Resolves a credential through the budget-capped fallback scan.
    fn validate_fallback(&self, raw_key: &str, credential_hash: &str) -> KeyValidation {
        let budget = &self.config.scan;
        let Ok(mut window) = self.scan_state.lock() else {
            // Poisoned accounting state denies rather than scanning unmetered.
            return KeyValidation::denied(self.debug_mode, "scan budget unavailable");
        };
        let now = Timestamp::now();
        let window_end = window.window_start.saturating_add(Duration::from_secs(budget.window_secs));
        if now.as_millis() >= window_end.as_millis() {
            *window = ScanWindow::fresh(now);
        }
        window.requests += 1;
        if window.requests > u64::from(budget.max_requests) {
            self.audit.record_auth(&AuthAuditEvent::new(
                false,
                "fallback_scan",
                credential_hash.to_string(),
                None,
                Some("request_budget_exhausted"),
            ));
            return KeyValidation::denied(self.debug_mode, "authentication scan budget exhausted");
        }
        for key in &self.config.fallback_keys {
            window.comparisons += 1;
            if window.comparisons > budget.max_comparisons {
                self.audit.record_auth(&AuthAuditEvent::new(
                    false,
                    "fallback_scan",
                    credential_hash.to_string(),
                    None,
                    Some("comparison_budget_exhausted"),
                ));
                return KeyValidation::denied(
                    self.debug_mode,
                    "authentication scan budget exhausted",
                );
            }
            if constant_time_eq_str(raw_key, key) {
                self.audit.record_auth(&AuthAuditEvent::new(
                    true,
                    "fallback_scan",
                    credential_hash.to_string(),
                    Some(credential_hash.to_string()),
                    None,
                ));
                return KeyValidation {
                    valid: true,
                    user_id: Some(credential_hash.to_string()),
                    is_admin: false,
                    debug_mode: self.debug_mode,
                    error: None,
                };
            }
        }
        self.audit.record_auth(&AuthAuditEvent::new(
            false,
            "fallback_scan",
            credential_hash.to_string(),
            None,
            Some("unknown_credential"),
        ));
        KeyValidation::denied(self.debug_mode, "unknown credential")
    }

    /// Provisions a user account.
    ///
    /// Generates a cryptographically random token, derives the user
    /// identifier from its hash, and writes the index entry keyed by that
    /// hash. The raw token is returned exactly once and never stored.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the index entry cannot be written.
    pub fn provision_user(
        &self,
        name: Option<String>,
        email: Option<String>,
        is_admin: bool,
    ) -> Result<ProvisionedUser, AuthError> {
        let raw_key: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LENGTH)
            .map(char::from)
            .collect();
        let user_id = sha256_hex(raw_key.as_bytes());
        let entry = AuthIndexEntry {
            user_id: user_id.clone(),
            name,
            email,
            is_admin,
            created_at: Timestamp::now(),
        };
        let value =
            serde_json::to_value(&entry).map_err(|err| AuthError::Serialization(err.to_string()))?;
        self.store.put(&Self::index_key(&user_id), value, PutOptions::default())?;
        Ok(ProvisionedUser {
            user_id,
            raw_key,
        })
    }

    /// Revokes a user by removing the index entry.
    ///
    /// Contexts already resolved for in-flight requests are unaffected;
    /// they are request-scoped and never persisted.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the index entry cannot be deleted.
    pub fn delete_user(&self, user_id: &str) -> Result<(), AuthError> {
        self.store.delete(&Self::index_key(user_id))?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
