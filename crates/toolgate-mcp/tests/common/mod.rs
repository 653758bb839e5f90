// crates/toolgate-mcp/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared fixtures for router, auth, and pipeline tests.
// Purpose: Provide reusable tool, resource, and prompt definitions plus
//          configured routers for deterministic testing.
// Dependencies: serde_json, toolgate-config, toolgate-core, toolgate-mcp
// ============================================================================

//! ## Overview
//! Shared fixtures for the protocol-surface integration tests: a known
//! admin secret, an echo tool matching the canonical wire example, gated
//! tools exercising both quality-check severities, and builders for routers
//! over an in-memory store.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap for clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use toolgate_config::AuthConfig;
use toolgate_config::ToolgateConfig;
use toolgate_core::KeyValueStore;
use toolgate_core::PutOptions;
use toolgate_mcp::CheckSeverity;
use toolgate_mcp::NoopAuditSink;
use toolgate_mcp::PromptArgument;
use toolgate_mcp::PromptDefinition;
use toolgate_mcp::QualityCheck;
use toolgate_mcp::QualityGateResult;
use toolgate_mcp::RequestHeaders;
use toolgate_mcp::ResourceDefinition;
use toolgate_mcp::ResourceReader;
use toolgate_mcp::Router;
use toolgate_mcp::RouterBuilder;
use toolgate_mcp::ToolContext;
use toolgate_mcp::ToolDefinition;
use toolgate_mcp::ToolError;
use toolgate_mcp::ToolHandler;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Admin secret used across the protocol tests.
pub const ADMIN_SECRET: &str = "test-admin-secret-0123456789abcdef";

// ============================================================================
// SECTION: Config and Headers
// ============================================================================

/// Builds a config with the test admin secret over the memory backend.
#[must_use]
pub fn test_config() -> ToolgateConfig {
    ToolgateConfig {
        auth: AuthConfig {
            admin_secret: Some(ADMIN_SECRET.to_string()),
            ..AuthConfig::default()
        },
        ..ToolgateConfig::default()
    }
}

/// Headers carrying the admin secret as a bearer token.
#[must_use]
pub fn admin_headers() -> RequestHeaders {
    RequestHeaders {
        authorization: Some(format!("Bearer {ADMIN_SECRET}")),
        admin_key: None,
        cookie: None,
    }
}

/// Headers carrying no credential at all.
#[must_use]
pub fn anonymous_headers() -> RequestHeaders {
    RequestHeaders::default()
}

// ============================================================================
// SECTION: Tool Fixtures
// ============================================================================

/// Echo tool matching the canonical wire example.
struct EchoTool;

impl ToolHandler for EchoTool {
    fn execute(&self, input: &Map<String, Value>, _ctx: &ToolContext) -> Result<Value, ToolError> {
        let message = input
            .get("message")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidParams("message is required".to_string()))?;
        Ok(json!({"content": [{"type": "text", "text": message}]}))
    }
}

/// Builds the `test:echo` definition.
#[must_use]
pub fn echo_tool() -> ToolDefinition {
    ToolDefinition {
        name: "test:echo".to_string(),
        description: "Echoes the message argument back as text content.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {"message": {"type": "string"}},
            "required": ["message"],
        }),
        handler: Arc::new(EchoTool),
    }
}

/// Tool that writes to storage and runs a quality gate over the result.
struct GatedTool {
    /// Whether the gate check passes.
    pass: bool,
    /// Severity attached to the check when failing.
    severity: CheckSeverity,
}

impl ToolHandler for GatedTool {
    fn execute(&self, _input: &Map<String, Value>, ctx: &ToolContext) -> Result<Value, ToolError> {
        ctx.storage.put("gated:last", json!("written"), PutOptions::default())?;
        Ok(json!({"content": [{"type": "text", "text": "done"}]}))
    }

    fn quality_gate(
        &self,
        _input: &Map<String, Value>,
        _result: &Value,
        _ctx: &ToolContext,
    ) -> Option<QualityGateResult> {
        Some(QualityGateResult {
            passed: self.pass,
            checks: vec![QualityCheck {
                name: "length".to_string(),
                passed: self.pass,
                message: (!self.pass).then(|| "output too short".to_string()),
                severity: self.severity,
                score: Some(if self.pass { 0.9 } else { 0.2 }),
            }],
        })
    }
}

/// Builds a gated tool definition with the given gate behavior.
#[must_use]
pub fn gated_tool(name: &str, pass: bool, severity: CheckSeverity) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: "Writes a marker and gates its own output.".to_string(),
        input_schema: json!({"type": "object"}),
        handler: Arc::new(GatedTool {
            pass,
            severity,
        }),
    }
}

/// Tool whose gate fails one error-severity and one warning-severity check.
struct MixedGateTool;

impl ToolHandler for MixedGateTool {
    fn execute(&self, _input: &Map<String, Value>, _ctx: &ToolContext) -> Result<Value, ToolError> {
        Ok(json!({"content": [{"type": "text", "text": "done"}]}))
    }

    fn quality_gate(
        &self,
        _input: &Map<String, Value>,
        _result: &Value,
        _ctx: &ToolContext,
    ) -> Option<QualityGateResult> {
        Some(QualityGateResult {
            passed: false,
            checks: vec![
                QualityCheck {
                    name: "length".to_string(),
                    passed: false,
                    message: Some("output too short".to_string()),
                    severity: CheckSeverity::Error,
                    score: Some(0.2),
                },
                QualityCheck {
                    name: "tone".to_string(),
                    passed: false,
                    message: Some("tone drifted".to_string()),
                    severity: CheckSeverity::Warning,
                    score: Some(0.5),
                },
            ],
        })
    }
}

/// Builds a tool whose gate mixes error and warning failures.
#[must_use]
pub fn mixed_gate_tool() -> ToolDefinition {
    ToolDefinition {
        name: "test:mixed".to_string(),
        description: "Fails its gate with mixed-severity checks.".to_string(),
        input_schema: json!({"type": "object"}),
        handler: Arc::new(MixedGateTool),
    }
}

/// Tool whose before hook always aborts.
struct AbortingTool;

impl ToolHandler for AbortingTool {
    fn execute(&self, _input: &Map<String, Value>, ctx: &ToolContext) -> Result<Value, ToolError> {
        ctx.storage.put("aborting:ran", json!(true), PutOptions::default())?;
        Ok(json!({"content": []}))
    }

    fn before_execute(&self, _ctx: &ToolContext) -> Result<(), ToolError> {
        Err(ToolError::Execution("precondition failed".to_string()))
    }
}

/// Builds a tool whose before hook aborts every invocation.
#[must_use]
pub fn aborting_tool() -> ToolDefinition {
    ToolDefinition {
        name: "test:aborting".to_string(),
        description: "Always aborts in its before hook.".to_string(),
        input_schema: json!({"type": "object"}),
        handler: Arc::new(AbortingTool),
    }
}

// ============================================================================
// SECTION: Resource and Prompt Fixtures
// ============================================================================

/// Static text resource provider.
struct StaticResource {
    /// Fixed content returned for every read.
    content: String,
}

impl ResourceReader for StaticResource {
    fn read(&self, _uri: &str) -> Result<String, ToolError> {
        Ok(self.content.clone())
    }
}

/// Builds a static text resource definition.
#[must_use]
pub fn static_resource(uri: &str, content: &str) -> ResourceDefinition {
    ResourceDefinition {
        uri: uri.to_string(),
        name: "fixture".to_string(),
        description: "Static fixture content.".to_string(),
        mime_type: "text/plain".to_string(),
        reader: Arc::new(StaticResource {
            content: content.to_string(),
        }),
    }
}

/// Builds a greeting prompt with one required argument.
#[must_use]
pub fn greeting_prompt() -> PromptDefinition {
    PromptDefinition {
        name: "greet".to_string(),
        description: "Greets a target.".to_string(),
        arguments: vec![PromptArgument {
            name: "who".to_string(),
            description: "Greeting target.".to_string(),
            required: true,
        }],
        template: "Hello, {who}!".to_string(),
    }
}

// ============================================================================
// SECTION: Router Builders
// ============================================================================

/// Builds a router with the echo tool, a resource, and a prompt registered.
#[must_use]
pub fn full_router() -> Router {
    RouterBuilder::new(test_config())
        .register_tool(echo_tool())
        .unwrap()
        .register_resource(static_resource("fixture://notes", "note body"))
        .unwrap()
        .register_prompt(greeting_prompt())
        .unwrap()
        .with_audit(Arc::new(NoopAuditSink))
        .build()
        .unwrap()
}

/// Builds a router with no capabilities registered.
#[must_use]
pub fn empty_router() -> Router {
    RouterBuilder::new(test_config()).with_audit(Arc::new(NoopAuditSink)).build().unwrap()
}

// ============================================================================
// SECTION: Response Helpers
// ============================================================================

/// Extracts the numeric error code from a response value.
#[must_use]
pub fn error_code(response: &Value) -> i64 {
    response["error"]["code"].as_i64().unwrap()
}
