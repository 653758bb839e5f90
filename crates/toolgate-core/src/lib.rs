// crates/toolgate-core/src/lib.rs
// ============================================================================
// Module: Toolgate Core Library
// Description: Versioned key-value storage contract and shared primitives.
// Purpose: Expose the storage engine interface, in-memory backend, and
//          hashing/security/time utilities shared across Toolgate crates.
// Dependencies: serde, serde_json, sha2, subtle, thiserror
// ============================================================================

//! ## Overview
//! Toolgate Core defines the versioned key-value storage contract shared by
//! every storage backend, together with the in-process [`MemoryStore`]
//! reference implementation, the [`atomic_update`] optimistic-retry helper,
//! and the hashing, constant-time comparison, and timestamp primitives used
//! by the auth subsystem.
//!
//! The storage contract is deliberately best-effort on backends whose
//! substrate is not serializable for single-key operations; see
//! [`KeyValueStore::put_if_match`] for the documented guarantee gap.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod atomic;
pub mod entry;
pub mod hashing;
pub mod memory;
pub mod security;
pub mod storage;
pub mod time;


// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use atomic::AtomicUpdateOutcome;
pub use atomic::atomic_update;
pub use entry::StoredEntry;
pub use entry::Versioned;
pub use entry::parse_version;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::hash_bytes;
pub use hashing::sha256_hex;
pub use memory::MemoryStore;
pub use security::constant_time_eq;
pub use security::constant_time_eq_str;
pub use storage::KeyValueStore;
pub use storage::ListOptions;
pub use storage::ListPage;
pub use storage::PutOptions;
pub use storage::ScopedStore;
pub use storage::SharedKeyValueStore;
pub use storage::StorageError;
pub use time::Timestamp;
