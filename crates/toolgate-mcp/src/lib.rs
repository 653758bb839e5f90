// crates/toolgate-mcp/src/lib.rs
// ============================================================================
// Module: Toolgate MCP Library
// Description: Protocol router, auth subsystem, and tool execution pipeline.
// Purpose: Expose the JSON-RPC request-handling core shared by tool
//          implementations: envelope validation, identity resolution,
//          capability registries, and the invocation pipeline.
// Dependencies: rand, serde, serde_json, thiserror, toolgate-config,
//               toolgate-core, toolgate-store-fs, toolgate-store-s3
// ============================================================================

//! ## Overview
//! Toolgate MCP is the request-handling core of the server: it parses and
//! validates JSON-RPC 2.0 envelopes, authenticates callers without ever
//! persisting raw credentials, dispatches to registered tools, resources,
//! and prompt templates, and persists state through the versioned key-value
//! contract in `toolgate-core`.
//!
//! The transport layer is out of scope: request bodies and header material
//! arrive already framed, and responses (or the absence of one, for
//! notifications) are handed back to the host.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod auth;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod tools;


// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use auth::AuthIndexEntry;
pub use auth::KeyValidation;
pub use auth::KeyValidator;
pub use auth::ProvisionedUser;
pub use protocol::ErrorCode;
pub use protocol::JsonRpcEnvelope;
pub use protocol::JsonRpcResponse;
pub use protocol::Method;
pub use protocol::RequestId;
pub use protocol::parse_envelope;
pub use registry::CheckSeverity;
pub use registry::PromptArgument;
pub use registry::PromptDefinition;
pub use registry::QualityCheck;
pub use registry::QualityGateResult;
pub use registry::ResourceDefinition;
pub use registry::ResourceReader;
pub use registry::ToolDefinition;
pub use registry::ToolHandler;
pub use registry::ToolRegistry;
pub use router::Router;
pub use router::RouterBuilder;
pub use router::RouterError;
pub use tools::RequestHeaders;
pub use tools::ToolContext;
pub use tools::ToolError;
pub use tools::extract_credential;
pub use tools::parse_bearer_token;
