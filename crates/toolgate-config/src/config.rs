// crates/toolgate-config/src/config.rs
// ============================================================================
// Module: Toolgate Configuration
// Description: Configuration structs, defaults, and cross-field validation.
// Purpose: Provide a single validated configuration model for the server,
//          auth subsystem, and storage backends.
// Dependencies: serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Every section carries serde defaults so partial TOML documents remain
//! valid. [`ToolgateConfig::validate`] enforces the cross-field rules: the
//! selected storage backend must carry its settings section, admin secrets
//! must meet a minimum length, and scan budgets must be positive.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Minimum accepted admin secret length in bytes.
const MIN_ADMIN_SECRET_BYTES: usize = 16;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document could not be parsed.
    #[error("config parse error: {0}")]
    Parse(String),
    /// The configuration is inconsistent or unsafe.
    #[error("config invalid: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Root Toolgate configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolgateConfig {
    /// Server identity settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Authentication settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Storage backend selection and settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ToolgateConfig {
    /// Parses and validates a TOML configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(document).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates cross-field consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the configuration is
    /// inconsistent or unsafe.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.auth.validate()?;
        self.storage.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Server Config
// ============================================================================

/// Server identity settings advertised during the initialize handshake.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Server name.
    #[serde(default = "default_server_name")]
    pub name: String,
    /// Server version string.
    #[serde(default = "default_server_version")]
    pub version: String,
    /// Protocol version advertised to clients.
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,
    /// Whether internal error detail is exposed in error responses and
    /// carried into tool contexts.
    #[serde(default)]
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            version: default_server_version(),
            protocol_version: default_protocol_version(),
            debug: false,
        }
    }
}

/// Default server name.
fn default_server_name() -> String {
    "toolgate".to_string()
}

/// Default server version (crate version).
fn default_server_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Default protocol version.
fn default_protocol_version() -> String {
    "2024-11-05".to_string()
}

// ============================================================================
// SECTION: Auth Config
// ============================================================================

/// Authentication settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Admin secret compared in constant time against caller credentials.
    /// Unset disables the admin path entirely.
    #[serde(default)]
    pub admin_secret: Option<String>,
    /// Header carrying an admin credential.
    #[serde(default = "default_admin_header")]
    pub admin_header: String,
    /// Cookie name carrying a session credential.
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
    /// Whether the hash-to-identity index is maintained and consulted.
    #[serde(default = "default_true")]
    pub index_enabled: bool,
    /// Fallback credential list scanned when the index is disabled.
    #[serde(default)]
    pub fallback_keys: Vec<String>,
    /// Budgets for the fallback linear scan.
    #[serde(default)]
    pub scan: ScanBudgetConfig,
}

impl AuthConfig {
    /// Validates auth settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(secret) = self.admin_secret.as_deref()
            && secret.len() < MIN_ADMIN_SECRET_BYTES
        {
            return Err(ConfigError::Invalid(format!(
                "admin_secret must be at least {MIN_ADMIN_SECRET_BYTES} bytes"
            )));
        }
        if self.admin_header.trim().is_empty() {
            return Err(ConfigError::Invalid("admin_header must be set".to_string()));
        }
        if self.session_cookie.trim().is_empty() {
            return Err(ConfigError::Invalid("session_cookie must be set".to_string()));
        }
        self.scan.validate()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_secret: None,
            admin_header: default_admin_header(),
            session_cookie: default_session_cookie(),
            index_enabled: true,
            fallback_keys: Vec::new(),
            scan: ScanBudgetConfig::default(),
        }
    }
}

/// Budgets bounding the fallback linear credential scan.
///
/// The fallback path exists for small deployments without an index; both the
/// request budget and the comparison budget are enforced per window so the
/// scan cannot become a denial-of-service vector.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanBudgetConfig {
    /// Window length in seconds.
    #[serde(default = "default_scan_window_secs")]
    pub window_secs: u64,
    /// Maximum scan requests per window.
    #[serde(default = "default_scan_max_requests")]
    pub max_requests: u32,
    /// Maximum credential comparisons per window.
    #[serde(default = "default_scan_max_comparisons")]
    pub max_comparisons: u64,
}

impl ScanBudgetConfig {
    /// Validates scan budgets.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.window_secs == 0 {
            return Err(ConfigError::Invalid("scan window_secs must be positive".to_string()));
        }
        if self.max_requests == 0 {
            return Err(ConfigError::Invalid("scan max_requests must be positive".to_string()));
        }
        if self.max_comparisons == 0 {
            return Err(ConfigError::Invalid("scan max_comparisons must be positive".to_string()));
        }
        Ok(())
    }
}

impl Default for ScanBudgetConfig {
    fn default() -> Self {
        Self {
            window_secs: default_scan_window_secs(),
            max_requests: default_scan_max_requests(),
            max_comparisons: default_scan_max_comparisons(),
        }
    }
}

/// Default admin credential header.
fn default_admin_header() -> String {
    "x-toolgate-admin-key".to_string()
}

/// Default session cookie name.
fn default_session_cookie() -> String {
    "toolgate_session".to_string()
}

/// Default scan window in seconds.
const fn default_scan_window_secs() -> u64 {
    60
}

/// Default scan requests per window.
const fn default_scan_max_requests() -> u32 {
    10
}

/// Default credential comparisons per window.
const fn default_scan_max_comparisons() -> u64 {
    1_000
}

/// Serde default helper returning true.
const fn default_true() -> bool {
    true
}

// ============================================================================
// SECTION: Storage Config
// ============================================================================

/// Storage backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Volatile in-process store.
    #[default]
    Memory,
    /// Local-disk JSON-file tree.
    File,
    /// S3-compatible remote object store.
    S3,
}

/// Storage backend selection and settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Selected backend.
    #[serde(default)]
    pub backend: StorageBackend,
    /// Namespace prefix silently applied to all keys.
    #[serde(default)]
    pub prefix: Option<String>,
    /// File backend settings (required when backend is `file`).
    #[serde(default)]
    pub file: Option<FileStoreConfig>,
    /// S3 backend settings (required when backend is `s3`).
    #[serde(default)]
    pub s3: Option<S3StoreConfig>,
}

impl StorageConfig {
    /// Validates backend selection against per-backend settings.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.backend {
            StorageBackend::Memory => Ok(()),
            StorageBackend::File => {
                let file = self
                    .file
                    .as_ref()
                    .ok_or_else(|| ConfigError::Invalid("file backend requires [storage.file]".to_string()))?;
                file.validate()
            }
            StorageBackend::S3 => {
                let s3 = self
                    .s3
                    .as_ref()
                    .ok_or_else(|| ConfigError::Invalid("s3 backend requires [storage.s3]".to_string()))?;
                s3.validate()
            }
        }
    }
}

/// File backend settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileStoreConfig {
    /// Root directory for entry documents.
    pub root: PathBuf,
}

impl FileStoreConfig {
    /// Validates file backend settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("file root must be set".to_string()));
        }
        Ok(())
    }
}

/// S3 backend settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct S3StoreConfig {
    /// Bucket name.
    pub bucket: String,
    /// AWS region override.
    #[serde(default)]
    pub region: Option<String>,
    /// Endpoint override for S3-compatible stores.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Key prefix applied inside the bucket.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Whether to force path-style addressing.
    #[serde(default)]
    pub force_path_style: bool,
}

impl S3StoreConfig {
    /// Validates S3 backend settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when settings are inconsistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.trim().is_empty() {
            return Err(ConfigError::Invalid("s3 bucket must be set".to_string()));
        }
        if let Some(prefix) = self.prefix.as_deref()
            && prefix.starts_with('/')
        {
            return Err(ConfigError::Invalid(
                "s3 prefix must be relative (no leading slash)".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Logging Config
// ============================================================================

/// Protocol log levels, ordered from most to least verbose.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Debug-level detail.
    Debug,
    /// Routine informational messages.
    #[default]
    Info,
    /// Normal but significant events.
    Notice,
    /// Warning conditions.
    Warning,
    /// Error conditions.
    Error,
    /// Critical conditions.
    Critical,
    /// Action must be taken immediately.
    Alert,
    /// System is unusable.
    Emergency,
}

impl LogLevel {
    /// Parses a protocol level name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "notice" => Some(Self::Notice),
            "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            "critical" => Some(Self::Critical),
            "alert" => Some(Self::Alert),
            "emergency" => Some(Self::Emergency),
            _ => None,
        }
    }

    /// Returns the protocol name for the level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Notice => "notice",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
            Self::Alert => "alert",
            Self::Emergency => "emergency",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logging settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Initial log level; adjustable at runtime via `logging/setLevel`.
    #[serde(default)]
    pub level: LogLevel,
}

// ============================================================================
// SECTION: Tests
// ============================================================================
