// crates/toolgate-mcp/tests/pipeline.rs
// ============================================================================
// Module: Pipeline Tests
// Description: Quality-gate classification and progress-record tests.
// Purpose: Validate response shaping for gated tools and the progress
//          time series persisted for every gated invocation.
// Dependencies: serde_json, toolgate-mcp
// ============================================================================

//! Tool execution pipeline integration tests.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions use unwrap for clarity."
)]

mod common;

use std::sync::Arc;

use serde_json::json;
use toolgate_core::KeyValueStore;
use toolgate_core::ListOptions;
use toolgate_mcp::CheckSeverity;
use toolgate_mcp::ErrorCode;
use toolgate_mcp::NoopAuditSink;
use toolgate_mcp::Router;
use toolgate_mcp::RouterBuilder;

use common::aborting_tool;
use common::admin_headers;
use common::error_code;
use common::gated_tool;
use common::test_config;

/// Builds a router with one gated tool under the given gate behavior.
fn gated_router(pass: bool, severity: CheckSeverity) -> Router {
    RouterBuilder::new(test_config())
        .register_tool(gated_tool("test:gated", pass, severity))
        .unwrap()
        .register_tool(aborting_tool())
        .unwrap()
        .with_audit(Arc::new(NoopAuditSink))
        .build()
        .unwrap()
}

/// Lists persisted progress keys for the gated tool.
fn progress_keys(router: &Router) -> Vec<String> {
    router.store().list("_progress:test:gated:", ListOptions::default()).unwrap().keys
}

const GATED_CALL: &str =
    r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"test:gated"}}"#;

#[test]
fn error_severity_failure_withholds_the_result_without_rollback() {
    let router = gated_router(false, CheckSeverity::Error);
    let response = router.handle(GATED_CALL, &admin_headers()).unwrap().into_value();
    assert_eq!(error_code(&response), ErrorCode::QualityGateFailed.code());
    assert_eq!(response["error"]["data"]["checks"][0]["severity"], json!("error"));

    // The handler already ran; its storage write stays in place.
    assert_eq!(router.store().get("gated:last").unwrap(), Some(json!("written")));
}

#[test]
fn warning_severity_failure_still_returns_the_result() {
    let router = gated_router(false, CheckSeverity::Warning);
    let response = router.handle(GATED_CALL, &admin_headers()).unwrap().into_value();
    assert_eq!(response["result"]["content"][0]["text"], json!("done"));
}

#[test]
fn blocked_response_lists_only_error_severity_checks() {
    let router = RouterBuilder::new(test_config())
        .register_tool(common::mixed_gate_tool())
        .unwrap()
        .with_audit(Arc::new(NoopAuditSink))
        .build()
        .unwrap();
    let body = r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"test:mixed"}}"#;
    let response = router.handle(body, &admin_headers()).unwrap().into_value();
    assert_eq!(error_code(&response), ErrorCode::QualityGateFailed.code());
    let checks = response["error"]["data"]["checks"].as_array().unwrap();
    assert_eq!(checks.len(), 1);
    assert_eq!(checks[0]["name"], json!("length"));
    assert_eq!(checks[0]["severity"], json!("error"));
}

#[test]
fn passing_gate_returns_the_result() {
    let router = gated_router(true, CheckSeverity::Error);
    let response = router.handle(GATED_CALL, &admin_headers()).unwrap().into_value();
    assert_eq!(response["result"]["content"][0]["text"], json!("done"));
}

#[test]
fn progress_records_persist_for_gated_calls_pass_or_fail() {
    let passing = gated_router(true, CheckSeverity::Error);
    assert!(passing.handle(GATED_CALL, &admin_headers()).is_some());
    let keys = progress_keys(&passing);
    assert_eq!(keys.len(), 1);
    let record = passing.store().get(&keys[0]).unwrap().unwrap();
    assert_eq!(record["tool"], json!("test:gated"));
    assert_eq!(record["passed"], json!(true));
    assert_eq!(record["scores"]["length"], json!(0.9));

    let failing = gated_router(false, CheckSeverity::Error);
    assert!(failing.handle(GATED_CALL, &admin_headers()).is_some());
    let keys = progress_keys(&failing);
    assert_eq!(keys.len(), 1);
    let record = failing.store().get(&keys[0]).unwrap().unwrap();
    assert_eq!(record["passed"], json!(false));
}

#[test]
fn ungated_tools_persist_no_progress_records() {
    let router = RouterBuilder::new(test_config())
        .register_tool(common::echo_tool())
        .unwrap()
        .with_audit(Arc::new(NoopAuditSink))
        .build()
        .unwrap();
    let body = r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"test:echo","arguments":{"message":"hi"}}}"#;
    assert!(router.handle(body, &admin_headers()).is_some());
    let page = router.store().list("_progress:", ListOptions::default()).unwrap();
    assert!(page.keys.is_empty());
}

#[test]
fn before_hook_failure_aborts_before_the_handler_runs() {
    let router = gated_router(true, CheckSeverity::Error);
    let body = r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"test:aborting"}}"#;
    let response = router.handle(body, &admin_headers()).unwrap().into_value();
    assert_eq!(error_code(&response), ErrorCode::InternalError.code());
    // Redacted outside debug mode.
    assert_eq!(response["error"]["message"], json!("internal error"));
    assert!(router.store().get("aborting:ran").unwrap().is_none());
}

#[test]
fn debug_mode_surfaces_handler_error_detail() {
    let mut config = test_config();
    config.server.debug = true;
    let router = RouterBuilder::new(config)
        .register_tool(aborting_tool())
        .unwrap()
        .with_audit(Arc::new(NoopAuditSink))
        .build()
        .unwrap();
    let body = r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"test:aborting"}}"#;
    let response = router.handle(body, &admin_headers()).unwrap().into_value();
    assert_eq!(error_code(&response), ErrorCode::InternalError.code());
    assert!(
        response["error"]["message"].as_str().unwrap().contains("precondition failed")
    );
}
