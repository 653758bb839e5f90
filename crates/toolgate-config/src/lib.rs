// crates/toolgate-config/src/lib.rs
// ============================================================================
// Module: Toolgate Config Library
// Description: Canonical configuration model for Toolgate.
// Purpose: Centralize configuration types, defaults, and validation.
// Dependencies: serde, thiserror, toml
// ============================================================================

//! ## Overview
//! This crate defines the canonical Toolgate configuration model. All
//! cross-field validation lives here so that server and storage crates
//! consume one validated source of truth. Validation fails closed: an
//! inconsistent configuration is an error, never a silent fallback.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;


// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::AuthConfig;
pub use config::ConfigError;
pub use config::FileStoreConfig;
pub use config::LogLevel;
pub use config::LoggingConfig;
pub use config::S3StoreConfig;
pub use config::ScanBudgetConfig;
pub use config::ServerConfig;
pub use config::StorageBackend;
pub use config::StorageConfig;
pub use config::ToolgateConfig;
