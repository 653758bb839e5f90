// crates/toolgate-mcp/src/protocol.rs
// ============================================================================
// Module: JSON-RPC Protocol
// Description: Envelope parsing, validation, methods, and error taxonomy.
// Purpose: Enforce the JSON-RPC 2.0 framing rules, including the load-bearing
//          distinction between requests and notifications.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! This module parses inbound JSON-RPC 2.0 envelopes and defines the method
//! dispatch tags and stable error codes used across the protocol surface.
//!
//! The presence or absence of `id` is semantically load-bearing: an envelope
//! without an `id` field is a *notification* and must never receive a
//! response body. Envelope validation is therefore done against the raw
//! JSON value rather than a derived struct, because a derived `Option<Value>`
//! cannot distinguish an absent `id` from an explicit `null` (which is
//! invalid here).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Required `jsonrpc` field value.
pub const JSONRPC_VERSION: &str = "2.0";

// ============================================================================
// SECTION: Request Identifier
// ============================================================================

/// Well-typed JSON-RPC request identifier.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestId {
    /// String identifier.
    String(String),
    /// Numeric identifier.
    Number(serde_json::Number),
}

impl RequestId {
    /// Renders the identifier as a JSON value for a response envelope.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::String(id) => Value::String(id.clone()),
            Self::Number(id) => Value::Number(id.clone()),
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(id) => write!(f, "{id}"),
            Self::Number(id) => write!(f, "{id}"),
        }
    }
}

// ============================================================================
// SECTION: Methods
// ============================================================================

/// Protocol method dispatch tag.
///
/// Method strings are mapped to an enumerated tag at the routing boundary so
/// missing dispatch cases are compiler errors rather than silent fall-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Capability and version handshake.
    Initialize,
    /// Post-handshake client notification.
    Initialized,
    /// List registered tools.
    ToolsList,
    /// Invoke a registered tool.
    ToolsCall,
    /// List registered resources.
    ResourcesList,
    /// Read a registered resource.
    ResourcesRead,
    /// List registered prompt templates.
    PromptsList,
    /// Render a registered prompt template.
    PromptsGet,
    /// Set the server log level.
    LoggingSetLevel,
}

impl Method {
    /// Maps a method string to its dispatch tag.
    #[must_use]
    pub fn parse(method: &str) -> Option<Self> {
        match method {
            "initialize" => Some(Self::Initialize),
            "initialized" => Some(Self::Initialized),
            "tools/list" => Some(Self::ToolsList),
            "tools/call" => Some(Self::ToolsCall),
            "resources/list" => Some(Self::ResourcesList),
            "resources/read" => Some(Self::ResourcesRead),
            "prompts/list" => Some(Self::PromptsList),
            "prompts/get" => Some(Self::PromptsGet),
            "logging/setLevel" => Some(Self::LoggingSetLevel),
            _ => None,
        }
    }

    /// Returns the wire method string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Initialized => "initialized",
            Self::ToolsList => "tools/list",
            Self::ToolsCall => "tools/call",
            Self::ResourcesList => "resources/list",
            Self::ResourcesRead => "resources/read",
            Self::PromptsList => "prompts/list",
            Self::PromptsGet => "prompts/get",
            Self::LoggingSetLevel => "logging/setLevel",
        }
    }

    /// Returns true when the method requires an authenticated caller.
    #[must_use]
    pub const fn requires_auth(self) -> bool {
        matches!(self, Self::ToolsCall | Self::ResourcesRead | Self::PromptsGet)
    }
}

// ============================================================================
// SECTION: Error Taxonomy
// ============================================================================

/// Stable protocol error codes.
///
/// Codes, not exception types, are the cross-language branching surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Request body is not valid JSON.
    ParseError,
    /// Envelope violates JSON-RPC 2.0 framing rules.
    InvalidRequest,
    /// Method is not in the dispatch table.
    MethodNotFound,
    /// Params fail method-specific validation.
    InvalidParams,
    /// Method requires credentials and none were supplied.
    AuthRequired,
    /// Supplied credentials did not validate.
    AuthFailed,
    /// Named tool is not registered.
    ToolNotFound,
    /// Requested resource URI is not registered.
    ResourceNotFound,
    /// Named prompt is not registered.
    PromptNotFound,
    /// Tool handler succeeded but its output failed an error-severity
    /// quality check; the result is withheld.
    QualityGateFailed,
    /// Unexpected internal failure; message redacted outside debug mode.
    InternalError,
}

impl ErrorCode {
    /// Returns the numeric JSON-RPC wire code.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::AuthRequired => -32001,
            Self::AuthFailed => -32002,
            Self::ToolNotFound => -32011,
            Self::ResourceNotFound => -32012,
            Self::PromptNotFound => -32013,
            Self::QualityGateFailed => -32014,
        }
    }

    /// Returns the default human-readable message for the code.
    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::ParseError => "parse error",
            Self::InvalidRequest => "invalid request",
            Self::MethodNotFound => "method not found",
            Self::InvalidParams => "invalid params",
            Self::AuthRequired => "authentication required",
            Self::AuthFailed => "authentication failed",
            Self::ToolNotFound => "tool not found",
            Self::ResourceNotFound => "resource not found",
            Self::PromptNotFound => "prompt not found",
            Self::QualityGateFailed => "quality gate failed",
            Self::InternalError => "internal error",
        }
    }
}

// ============================================================================
// SECTION: Envelope
// ============================================================================

/// Validated inbound JSON-RPC envelope.
#[derive(Debug, Clone)]
pub struct JsonRpcEnvelope {
    /// Request identifier. `None` marks a notification.
    pub id: Option<RequestId>,
    /// Raw method string.
    pub method: String,
    /// Params object. Absent params normalize to an empty object.
    pub params: Map<String, Value>,
}

impl JsonRpcEnvelope {
    /// Returns true when the envelope is a notification (no `id` field).
    #[must_use]
    pub const fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Envelope-level rejection before routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Body is not valid JSON.
    Parse(String),
    /// Body is JSON but violates framing rules.
    Invalid(String),
}

/// Parses and validates a raw request body into an envelope.
///
/// # Errors
///
/// Returns [`EnvelopeError::Parse`] when the body is not JSON and
/// [`EnvelopeError::Invalid`] when framing rules are violated: `jsonrpc`
/// must be exactly `"2.0"`, `method` must be a string, `id` (when present)
/// must be a string or number (`null` is invalid), and `params` (when
/// present) must be an object.
pub fn parse_envelope(body: &str) -> Result<JsonRpcEnvelope, EnvelopeError> {
    let value: Value =
        serde_json::from_str(body).map_err(|err| EnvelopeError::Parse(err.to_string()))?;
    let Value::Object(fields) = value else {
        return Err(EnvelopeError::Invalid("request body must be a JSON object".to_string()));
    };
    match fields.get("jsonrpc") {
        Some(Value::String(version)) if version == JSONRPC_VERSION => {}
        _ => {
            return Err(EnvelopeError::Invalid(format!(
                "jsonrpc field must be \"{JSONRPC_VERSION}\""
            )));
        }
    }
    let method = match fields.get("method") {
        Some(Value::String(method)) => method.clone(),
        _ => return Err(EnvelopeError::Invalid("method field must be a string".to_string())),
    };
    let id = match fields.get("id") {
        None => None,
        Some(Value::String(id)) => Some(RequestId::String(id.clone())),
        Some(Value::Number(id)) => Some(RequestId::Number(id.clone())),
        Some(_) => {
            return Err(EnvelopeError::Invalid(
                "id field must be a string or number when present".to_string(),
            ));
        }
    };
    let params = match fields.get("params") {
        None => Map::new(),
        Some(Value::Object(params)) => params.clone(),
        Some(_) => {
            return Err(EnvelopeError::Invalid(
                "params field must be an object when present".to_string(),
            ));
        }
    };
    Ok(JsonRpcEnvelope {
        id,
        method,
        params,
    })
}

// ============================================================================
// SECTION: Responses
// ============================================================================

/// Outbound JSON-RPC response body.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcResponse {
    /// Serialized response envelope.
    body: Value,
}

impl JsonRpcResponse {
    /// Builds a success response for a request.
    #[must_use]
    pub fn success(id: &RequestId, result: Value) -> Self {
        Self {
            body: json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": id.to_value(),
                "result": result,
            }),
        }
    }

    /// Builds an error response for a request.
    #[must_use]
    pub fn error(id: Option<&RequestId>, code: ErrorCode, message: &str) -> Self {
        Self {
            body: json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": id.map_or(Value::Null, RequestId::to_value),
                "error": {
                    "code": code.code(),
                    "message": message,
                },
            }),
        }
    }

    /// Builds an error response carrying structured data.
    #[must_use]
    pub fn error_with_data(
        id: Option<&RequestId>,
        code: ErrorCode,
        message: &str,
        data: Value,
    ) -> Self {
        Self {
            body: json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": id.map_or(Value::Null, RequestId::to_value),
                "error": {
                    "code": code.code(),
                    "message": message,
                    "data": data,
                },
            }),
        }
    }

    /// Returns the response body as a JSON value.
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.body
    }

    /// Consumes the response, returning the JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.body
    }

    /// Serializes the response to a wire string.
    #[must_use]
    pub fn to_body(&self) -> String {
        self.body.to_string()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
