// crates/toolgate-config/tests/config_validation.rs
// ============================================================================
// Module: Config Validation Tests
// Description: Cross-field validation tests for the Toolgate config model.
// Purpose: Validate fail-closed behavior for inconsistent configuration.
// Dependencies: toolgate-config
// ============================================================================

//! Configuration validation tests.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions use unwrap for clarity."
)]

use toolgate_config::ConfigError;
use toolgate_config::StorageBackend;
use toolgate_config::ToolgateConfig;

#[test]
fn full_document_parses_and_validates() {
    let document = r#"
        [server]
        name = "toolgate-test"
        debug = true

        [auth]
        admin_secret = "0123456789abcdef0123456789abcdef"
        index_enabled = false
        fallback_keys = ["key-one", "key-two"]

        [auth.scan]
        window_secs = 30
        max_requests = 5
        max_comparisons = 100

        [storage]
        backend = "file"
        prefix = "tenant-a:"

        [storage.file]
        root = "/var/lib/toolgate"

        [logging]
        level = "warning"
    "#;
    let config = ToolgateConfig::from_toml_str(document).unwrap();
    assert_eq!(config.server.name, "toolgate-test");
    assert_eq!(config.storage.backend, StorageBackend::File);
    assert_eq!(config.auth.fallback_keys.len(), 2);
}

#[test]
fn file_backend_without_settings_is_rejected() {
    let document = r#"
        [storage]
        backend = "file"
    "#;
    let result = ToolgateConfig::from_toml_str(document);
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn s3_backend_without_settings_is_rejected() {
    let document = r#"
        [storage]
        backend = "s3"
    "#;
    let result = ToolgateConfig::from_toml_str(document);
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn s3_absolute_prefix_is_rejected() {
    let document = r#"
        [storage]
        backend = "s3"

        [storage.s3]
        bucket = "toolgate-data"
        prefix = "/absolute"
    "#;
    let result = ToolgateConfig::from_toml_str(document);
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn short_admin_secret_is_rejected() {
    let document = r#"
        [auth]
        admin_secret = "too-short"
    "#;
    let result = ToolgateConfig::from_toml_str(document);
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn zero_scan_budgets_are_rejected() {
    for field in ["window_secs", "max_requests", "max_comparisons"] {
        let document = format!(
            r#"
            [auth.scan]
            {field} = 0
            "#
        );
        let result = ToolgateConfig::from_toml_str(&document);
        assert!(matches!(result, Err(ConfigError::Invalid(_))), "{field} = 0 should be rejected");
    }
}

#[test]
fn unknown_fields_are_rejected() {
    let document = r#"
        [server]
        nmae = "typo"
    "#;
    let result = ToolgateConfig::from_toml_str(document);
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}
