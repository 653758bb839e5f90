// crates/toolgate-mcp/src/audit.rs
// ============================================================================
// Module: Audit Logging
// Description: Structured audit events for auth decisions and tool calls.
// Purpose: Emit redacted JSON-line audit logs without hard dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! This module defines audit event payloads and sinks for request handling.
//! It is intentionally lightweight so deployments can route events to their
//! preferred logging pipeline without redesign. Events never contain raw
//! credentials; auth events identify callers by credential hash only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;

use serde::Serialize;
use toolgate_core::Timestamp;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Authentication decision audit event.
#[derive(Debug, Clone, Serialize)]
pub struct AuthAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u64,
    /// Whether the credential validated.
    pub allowed: bool,
    /// Validation path taken.
    pub via: &'static str,
    /// SHA-256 hash of the presented credential.
    pub credential_hash: String,
    /// Resolved user identifier when known.
    pub user_id: Option<String>,
    /// Denial reason label when denied.
    pub reason: Option<&'static str>,
}

impl AuthAuditEvent {
    /// Creates a new auth audit event with a consistent timestamp.
    #[must_use]
    pub fn new(
        allowed: bool,
        via: &'static str,
        credential_hash: String,
        user_id: Option<String>,
        reason: Option<&'static str>,
    ) -> Self {
        Self {
            event: "auth_decision",
            timestamp_ms: Timestamp::now().as_millis(),
            allowed,
            via,
            credential_hash,
            user_id,
            reason,
        }
    }
}

/// Tool invocation audit event.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u64,
    /// Tool name.
    pub tool: String,
    /// Request identifier when the call was a request.
    pub request_id: Option<String>,
    /// Outcome label.
    pub outcome: &'static str,
    /// JSON-RPC error code when the call failed.
    pub error_code: Option<i64>,
}

impl ToolCallAuditEvent {
    /// Creates a new tool-call audit event with a consistent timestamp.
    #[must_use]
    pub fn new(
        tool: String,
        request_id: Option<String>,
        outcome: &'static str,
        error_code: Option<i64>,
    ) -> Self {
        Self {
            event: "tool_call",
            timestamp_ms: Timestamp::now().as_millis(),
            tool,
            request_id,
            outcome,
            error_code,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for protocol events.
pub trait AuditSink: Send + Sync {
    /// Record an authentication decision.
    fn record_auth(&self, event: &AuthAuditEvent);

    /// Record a tool invocation outcome.
    fn record_tool_call(&self, event: &ToolCallAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record_auth(&self, event: &AuthAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }

    fn record_tool_call(&self, event: &ToolCallAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record_auth(&self, _event: &AuthAuditEvent) {}

    fn record_tool_call(&self, _event: &ToolCallAuditEvent) {}
}
