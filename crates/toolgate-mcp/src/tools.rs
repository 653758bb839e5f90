// crates/toolgate-mcp/src/tools.rs
// ============================================================================
// Module: Tool Execution Pipeline
// Description: Credential extraction, per-call context, and tool invocation.
// Purpose: Run lifecycle hooks and quality gates around tool handlers and
//          persist progress records for gated tools.
// Dependencies: serde_json, thiserror, toolgate-core
// ============================================================================

//! ## Overview
//! The pipeline extracts the caller credential (header material first, then
//! the in-envelope metadata field for callers that cannot set custom
//! headers), builds a per-invocation [`ToolContext`], and sequences
//! `before_execute`, the handler, the optional quality gate, and
//! `after_execute`.
//!
//! The quality gate is response-shaping, not transactional: an
//! error-severity failing check withholds the handler result even though
//! the handler already ran and may have mutated storage. Warning-severity
//! failures ride along with the original result.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use toolgate_core::KeyValueStore;
use toolgate_core::PutOptions;
use toolgate_core::SharedKeyValueStore;
use toolgate_core::StorageError;
use toolgate_core::Timestamp;

use crate::registry::CheckSeverity;
use crate::registry::QualityCheck;
use crate::registry::ToolDefinition;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Reserved storage key prefix for tool progress records.
pub const PROGRESS_KEY_PREFIX: &str = "_progress:";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Tool handler and hook failures.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Input failed tool-specific validation.
    #[error("invalid params: {0}")]
    InvalidParams(String),
    /// Handler or hook failed while running.
    #[error("tool execution failed: {0}")]
    Execution(String),
    /// Underlying storage failure.
    #[error("tool storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Terminal pipeline outcomes that withhold a result.
#[derive(Debug)]
pub enum ToolCallError {
    /// The handler or a lifecycle hook failed.
    Tool(ToolError),
    /// The handler succeeded but an error-severity check failed; the
    /// result is withheld.
    GateBlocked {
        /// Failing error-severity checks.
        failures: Vec<QualityCheck>,
    },
}

// ============================================================================
// SECTION: Credential Extraction
// ============================================================================

/// Header material extracted by the transport wrapper.
#[derive(Debug, Clone, Default)]
pub struct RequestHeaders {
    /// `Authorization` header value.
    pub authorization: Option<String>,
    /// Admin-specific header value.
    pub admin_key: Option<String>,
    /// `Cookie` header value.
    pub cookie: Option<String>,
}

/// Parses a bearer token out of an `Authorization` header value.
#[must_use]
pub fn parse_bearer_token(header: &str) -> Option<String> {
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next()?;
    let token = parts.next()?.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

/// Extracts a named cookie value from a `Cookie` header.
fn parse_cookie(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}

/// Extracts the raw credential for a call, first present wins:
/// Authorization bearer, admin header, session cookie, then the
/// `params._meta.authKey` envelope field.
#[must_use]
pub fn extract_credential(
    headers: &RequestHeaders,
    params: &Map<String, Value>,
    cookie_name: &str,
) -> Option<String> {
    if let Some(authorization) = headers.authorization.as_deref()
        && let Some(token) = parse_bearer_token(authorization)
    {
        return Some(token);
    }
    if let Some(admin_key) = headers.admin_key.as_deref()
        && !admin_key.is_empty()
    {
        return Some(admin_key.to_string());
    }
    if let Some(cookie) = headers.cookie.as_deref()
        && let Some(session) = parse_cookie(cookie, cookie_name)
    {
        return Some(session);
    }
    params
        .get("_meta")
        .and_then(Value::as_object)
        .and_then(|meta| meta.get("authKey"))
        .and_then(Value::as_str)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
}

// ============================================================================
// SECTION: Tool Context
// ============================================================================

/// Per-invocation context handed to tool handlers.
///
/// Built strictly from the validation result plus request metadata. The raw
/// credential is deliberately excluded; only its hash crosses this boundary,
/// so logs or debug dumps built from a context cannot leak a usable key.
#[derive(Clone)]
pub struct ToolContext {
    /// SHA-256 hash of the presented credential.
    pub auth_key_hash: String,
    /// Resolved user identifier when known.
    pub user_id: Option<String>,
    /// Whether the caller has admin privileges.
    pub is_admin: bool,
    /// Storage handle for the invocation.
    pub storage: SharedKeyValueStore,
    /// Server environment values exposed to tools.
    pub env: BTreeMap<String, String>,
    /// Whether the server runs in debug mode.
    pub debug_mode: bool,
    /// Request identifier when the call was a request.
    pub request_id: Option<String>,
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Successful invocation output.
#[derive(Debug)]
pub struct ToolCallSuccess {
    /// Handler result.
    pub result: Value,
    /// Failing warning-severity checks recorded alongside the result.
    pub warnings: Vec<QualityCheck>,
}

/// Runs one tool invocation through the full pipeline.
///
/// Sequencing: `before_execute`, handler, quality gate, `after_execute`.
/// Whenever the tool defines a gate, a progress record is persisted under
/// [`PROGRESS_KEY_PREFIX`] regardless of pass or fail, building a time
/// series inspectable with a prefix list.
///
/// # Errors
///
/// Returns [`ToolCallError::Tool`] when a hook or the handler fails and
/// [`ToolCallError::GateBlocked`] when an error-severity check fails.
pub fn execute_tool(
    definition: &ToolDefinition,
    input: &Map<String, Value>,
    ctx: &ToolContext,
) -> Result<ToolCallSuccess, ToolCallError> {
    definition.handler.before_execute(ctx).map_err(ToolCallError::Tool)?;
    let result = definition.handler.execute(input, ctx).map_err(ToolCallError::Tool)?;

    let gate = definition.handler.quality_gate(input, &result, ctx);
    let mut warnings = Vec::new();
    if let Some(gate) = &gate {
        // Advisory side effect: a failed progress write never fails the call.
        let _ = persist_progress_record(definition, gate.passed, &gate.scores(), ctx);
        if gate.has_blocking_failure() {
            let failures = gate
                .checks
                .iter()
                .filter(|check| !check.passed && check.severity == CheckSeverity::Error)
                .cloned()
                .collect();
            return Err(ToolCallError::GateBlocked {
                failures,
            });
        }
        warnings = gate.checks.iter().filter(|check| !check.passed).cloned().collect();
    }

    definition.handler.after_execute(ctx).map_err(ToolCallError::Tool)?;
    Ok(ToolCallSuccess {
        result,
        warnings,
    })
}

/// Persists one progress record for a gated invocation.
fn persist_progress_record(
    definition: &ToolDefinition,
    passed: bool,
    scores: &[(String, f64)],
    ctx: &ToolContext,
) -> Result<(), StorageError> {
    let timestamp_ms = Timestamp::now().as_millis();
    let key = format!("{PROGRESS_KEY_PREFIX}{}:{timestamp_ms}", definition.name);
    let scores: Map<String, Value> =
        scores.iter().map(|(name, score)| (name.clone(), json!(score))).collect();
    let record = json!({
        "tool": definition.name,
        "timestamp_ms": timestamp_ms,
        "passed": passed,
        "scores": scores,
    });
    ctx.storage.put(&key, record, PutOptions::default())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions use unwrap for clarity.")]

    use super::*;

    #[test]
    fn bearer_parsing_requires_scheme_and_token() {
        assert_eq!(parse_bearer_token("Bearer abc123"), Some("abc123".to_string()));
        assert_eq!(parse_bearer_token("bearer abc123"), Some("abc123".to_string()));
        assert_eq!(parse_bearer_token("Basic abc123"), None);
        assert_eq!(parse_bearer_token("Bearer "), None);
        assert_eq!(parse_bearer_token("abc123"), None);
    }

    #[test]
    fn credential_precedence_prefers_bearer_header() {
        let headers = RequestHeaders {
            authorization: Some("Bearer from-bearer".to_string()),
            admin_key: Some("from-admin".to_string()),
            cookie: Some("toolgate_session=from-cookie".to_string()),
        };
        let mut params = Map::new();
        params.insert("_meta".to_string(), json!({"authKey": "from-meta"}));
        let credential = extract_credential(&headers, &params, "toolgate_session");
        assert_eq!(credential.as_deref(), Some("from-bearer"));
    }

    #[test]
    fn credential_falls_back_through_each_transport() {
        let mut params = Map::new();
        params.insert("_meta".to_string(), json!({"authKey": "from-meta"}));

        let admin = RequestHeaders {
            authorization: None,
            admin_key: Some("from-admin".to_string()),
            cookie: Some("toolgate_session=from-cookie".to_string()),
        };
        assert_eq!(
            extract_credential(&admin, &params, "toolgate_session").as_deref(),
            Some("from-admin")
        );

        let cookie = RequestHeaders {
            authorization: None,
            admin_key: None,
            cookie: Some("other=x; toolgate_session=from-cookie".to_string()),
        };
        assert_eq!(
            extract_credential(&cookie, &params, "toolgate_session").as_deref(),
            Some("from-cookie")
        );

        let meta_only = RequestHeaders::default();
        assert_eq!(
            extract_credential(&meta_only, &params, "toolgate_session").as_deref(),
            Some("from-meta")
        );

        assert!(extract_credential(&meta_only, &Map::new(), "toolgate_session").is_none());
    }

    #[test]
    fn malformed_authorization_header_falls_through() {
        let headers = RequestHeaders {
            authorization: Some("Token xyz".to_string()),
            admin_key: Some("from-admin".to_string()),
            cookie: None,
        };
        let credential = extract_credential(&headers, &Map::new(), "toolgate_session");
        assert_eq!(credential.as_deref(), Some("from-admin"));
    }
}
