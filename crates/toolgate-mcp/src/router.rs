// crates/toolgate-mcp/src/router.rs
// ============================================================================
// Module: Protocol Router
// Description: Per-envelope state machine and method dispatch.
// Purpose: Validate envelopes, resolve identity where required, execute
//          method handlers, and enforce notification response suppression.
// Dependencies: serde_json, thiserror, toolgate-config, toolgate-core,
//               toolgate-store-fs, toolgate-store-s3
// ============================================================================

//! ## Overview
//! One router instance owns its capability registries, storage handle, and
//! credential validator; multiple independent routers can coexist in one
//! process. Each inbound body is handled as a stateless invocation:
//! parse, validate, route by method tag, authenticate where required,
//! execute, respond.
//!
//! An envelope without an `id` field is a notification: its side effects
//! still run (including `logging/setLevel`), but the router returns no
//! response body for it, for every method including unknown ones.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use toolgate_config::ConfigError;
use toolgate_config::LogLevel;
use toolgate_config::StorageBackend;
use toolgate_config::StorageConfig;
use toolgate_config::ToolgateConfig;
use toolgate_core::MemoryStore;
use toolgate_core::ScopedStore;
use toolgate_core::SharedKeyValueStore;
use toolgate_core::StorageError;
use toolgate_core::sha256_hex;
use toolgate_store_fs::FileStore;
use toolgate_store_s3::RemoteStore;

use crate::audit::AuditSink;
use crate::audit::StderrAuditSink;
use crate::audit::ToolCallAuditEvent;
use crate::auth::KeyValidation;
use crate::auth::KeyValidator;
use crate::protocol::EnvelopeError;
use crate::protocol::ErrorCode;
use crate::protocol::JsonRpcEnvelope;
use crate::protocol::JsonRpcResponse;
use crate::protocol::Method;
use crate::protocol::parse_envelope;
use crate::registry::CheckSeverity;
use crate::registry::PromptDefinition;
use crate::registry::PromptRegistry;
use crate::registry::QualityCheck;
use crate::registry::RegistryError;
use crate::registry::ResourceDefinition;
use crate::registry::ResourceRegistry;
use crate::registry::ToolDefinition;
use crate::registry::ToolRegistry;
use crate::tools::RequestHeaders;
use crate::tools::ToolCallError;
use crate::tools::ToolContext;
use crate::tools::ToolError;
use crate::tools::execute_tool;
use crate::tools::extract_credential;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Router construction errors.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Configuration is invalid.
    #[error("router config error: {0}")]
    Config(#[from] ConfigError),
    /// Storage backend could not be initialized.
    #[error("router storage error: {0}")]
    Storage(#[from] StorageError),
    /// Capability registration failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

// ============================================================================
// SECTION: Replies
// ============================================================================

/// Method execution outcome before response shaping.
enum Reply {
    /// Successful result payload.
    Result(Value),
    /// Typed protocol error.
    Error {
        /// Stable error code.
        code: ErrorCode,
        /// Human-readable message.
        message: String,
        /// Optional structured error data.
        data: Option<Value>,
    },
}

impl Reply {
    /// Builds an error reply with the code's default message.
    fn error(code: ErrorCode) -> Self {
        Self::Error {
            code,
            message: code.default_message().to_string(),
            data: None,
        }
    }

    /// Builds an error reply with a specific message.
    fn error_with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
            data: None,
        }
    }
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builder assembling a router from config and capability definitions.
pub struct RouterBuilder {
    /// Full server configuration.
    config: ToolgateConfig,
    /// Tool registry under construction.
    tools: ToolRegistry,
    /// Resource registry under construction.
    resources: ResourceRegistry,
    /// Prompt registry under construction.
    prompts: PromptRegistry,
    /// Storage handle override.
    store: Option<SharedKeyValueStore>,
    /// Audit sink override.
    audit: Option<Arc<dyn AuditSink>>,
}

impl RouterBuilder {
    /// Starts a builder from a configuration.
    #[must_use]
    pub fn new(config: ToolgateConfig) -> Self {
        Self {
            config,
            tools: ToolRegistry::new(),
            resources: ResourceRegistry::new(),
            prompts: PromptRegistry::new(),
            store: None,
            audit: None,
        }
    }

    /// Registers a tool definition.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] when the name is taken.
    pub fn register_tool(mut self, definition: ToolDefinition) -> Result<Self, RegistryError> {
        self.tools.register(definition)?;
        Ok(self)
    }

    /// Registers a resource definition.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] when the URI is taken.
    pub fn register_resource(
        mut self,
        definition: ResourceDefinition,
    ) -> Result<Self, RegistryError> {
        self.resources.register(definition)?;
        Ok(self)
    }

    /// Registers a prompt definition.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] when the name is taken.
    pub fn register_prompt(mut self, definition: PromptDefinition) -> Result<Self, RegistryError> {
        self.prompts.register(definition)?;
        Ok(self)
    }

    /// Overrides the storage handle instead of building one from config.
    #[must_use]
    pub fn with_store(mut self, store: SharedKeyValueStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Overrides the audit sink (stderr by default).
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Builds the router, validating config and initializing storage.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError`] when config validation or backend
    /// initialization fails.
    pub fn build(self) -> Result<Router, RouterError> {
        self.config.validate()?;
        let audit = self.audit.unwrap_or_else(|| Arc::new(StderrAuditSink));
        let base = match self.store {
            Some(store) => store,
            None => build_store(&self.config.storage)?,
        };
        let store = match self.config.storage.prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => {
                SharedKeyValueStore::from_store(ScopedStore::new(base, prefix))
            }
            _ => base,
        };
        let validator = KeyValidator::new(
            self.config.auth.clone(),
            store.clone(),
            self.config.server.debug,
            Arc::clone(&audit),
        );
        let log_level = Mutex::new(self.config.logging.level);
        Ok(Router {
            config: self.config,
            tools: self.tools,
            resources: self.resources,
            prompts: self.prompts,
            store,
            validator,
            audit,
            log_level,
        })
    }
}

/// Builds the configured storage backend.
fn build_store(config: &StorageConfig) -> Result<SharedKeyValueStore, RouterError> {
    match config.backend {
        StorageBackend::Memory => Ok(SharedKeyValueStore::from_store(MemoryStore::new())),
        StorageBackend::File => {
            let settings = config.file.as_ref().ok_or_else(|| {
                RouterError::Config(ConfigError::Invalid("file backend settings missing".to_string()))
            })?;
            Ok(SharedKeyValueStore::from_store(FileStore::new(settings.root.clone())?))
        }
        StorageBackend::S3 => {
            let settings = config.s3.as_ref().ok_or_else(|| {
                RouterError::Config(ConfigError::Invalid("s3 backend settings missing".to_string()))
            })?;
            Ok(SharedKeyValueStore::from_store(RemoteStore::from_config(settings)?))
        }
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Protocol router owning registries, storage, and the credential validator.
pub struct Router {
    /// Full server configuration.
    config: ToolgateConfig,
    /// Registered tools.
    tools: ToolRegistry,
    /// Registered resources.
    resources: ResourceRegistry,
    /// Registered prompts.
    prompts: PromptRegistry,
    /// Storage handle shared with tool invocations.
    store: SharedKeyValueStore,
    /// Credential validator.
    validator: KeyValidator,
    /// Audit sink.
    audit: Arc<dyn AuditSink>,
    /// Current log level, adjustable via `logging/setLevel`.
    log_level: Mutex<LogLevel>,
}

impl Router {
    /// Returns the storage handle used by the router.
    #[must_use]
    pub fn store(&self) -> SharedKeyValueStore {
        self.store.clone()
    }

    /// Returns the credential validator for provisioning flows.
    #[must_use]
    pub const fn validator(&self) -> &KeyValidator {
        &self.validator
    }

    /// Returns the current log level.
    #[must_use]
    pub fn log_level(&self) -> LogLevel {
        *self.log_level.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Handles one framed request body.
    ///
    /// Returns `Some` with a JSON-RPC response for requests, `None` (an
    /// empty acknowledgement) for notifications and for invalid
    /// notifications that were silently discarded.
    #[must_use]
    pub fn handle(&self, body: &str, headers: &RequestHeaders) -> Option<JsonRpcResponse> {
        let envelope = match parse_envelope(body) {
            Ok(envelope) => envelope,
            Err(EnvelopeError::Parse(detail)) => {
                return Some(JsonRpcResponse::error(
                    None,
                    ErrorCode::ParseError,
                    &self.surface_message(ErrorCode::ParseError, &detail),
                ));
            }
            Err(EnvelopeError::Invalid(detail)) => {
                return Some(JsonRpcResponse::error(None, ErrorCode::InvalidRequest, &detail));
            }
        };

        let reply = match Method::parse(&envelope.method) {
            Some(method) => self.run_method(method, &envelope, headers),
            // Unknown notifications are silently discarded; unknown
            // requests surface MethodNotFound.
            None => Reply::error_with_message(
                ErrorCode::MethodNotFound,
                format!("unknown method: {}", envelope.method),
            ),
        };

        let id = envelope.id.as_ref()?;
        Some(match reply {
            Reply::Result(result) => JsonRpcResponse::success(id, result),
            Reply::Error {
                code,
                message,
                data,
            } => match data {
                Some(data) => JsonRpcResponse::error_with_data(Some(id), code, &message, data),
                None => JsonRpcResponse::error(Some(id), code, &message),
            },
        })
    }

    /// Runs a routed method, including auth where the method requires it.
    fn run_method(
        &self,
        method: Method,
        envelope: &JsonRpcEnvelope,
        headers: &RequestHeaders,
    ) -> Reply {
        match method {
            Method::Initialize => self.handle_initialize(&envelope.params),
            Method::Initialized => Reply::Result(json!({})),
            Method::ToolsList => Reply::Result(json!({"tools": self.tools.descriptors()})),
            Method::ToolsCall => self.handle_tools_call(envelope, headers),
            Method::ResourcesList => {
                Reply::Result(json!({"resources": self.resources.descriptors()}))
            }
            Method::ResourcesRead => self.handle_resources_read(envelope, headers),
            Method::PromptsList => Reply::Result(json!({"prompts": self.prompts.descriptors()})),
            Method::PromptsGet => self.handle_prompts_get(envelope, headers),
            Method::LoggingSetLevel => self.handle_set_level(&envelope.params),
        }
    }

    /// Handles the `initialize` handshake.
    fn handle_initialize(&self, params: &Map<String, Value>) -> Reply {
        if !matches!(params.get("protocolVersion"), Some(Value::String(_))) {
            return Reply::error_with_message(
                ErrorCode::InvalidParams,
                "protocolVersion is required",
            );
        }
        if !matches!(params.get("clientInfo"), Some(Value::Object(_))) {
            return Reply::error_with_message(ErrorCode::InvalidParams, "clientInfo is required");
        }
        let mut capabilities = Map::new();
        if !self.tools.is_empty() {
            capabilities.insert("tools".to_string(), json!({}));
        }
        if !self.resources.is_empty() {
            capabilities.insert("resources".to_string(), json!({}));
        }
        if !self.prompts.is_empty() {
            capabilities.insert("prompts".to_string(), json!({}));
        }
        capabilities.insert("logging".to_string(), json!({}));
        Reply::Result(json!({
            "protocolVersion": self.config.server.protocol_version,
            "serverInfo": {
                "name": self.config.server.name,
                "version": self.config.server.version,
            },
            "capabilities": capabilities,
        }))
    }

    /// Resolves the caller identity for an auth-required method.
    ///
    /// Returns the validation together with the credential hash on success.
    fn authenticate(
        &self,
        params: &Map<String, Value>,
        headers: &RequestHeaders,
    ) -> Result<(KeyValidation, String), Reply> {
        let Some(raw_key) =
            extract_credential(headers, params, &self.config.auth.session_cookie)
        else {
            return Err(Reply::error(ErrorCode::AuthRequired));
        };
        let validation = self.validator.validate_key(&raw_key);
        if !validation.valid {
            let message = validation
                .error
                .unwrap_or_else(|| ErrorCode::AuthFailed.default_message().to_string());
            return Err(Reply::error_with_message(ErrorCode::AuthFailed, message));
        }
        let hash = sha256_hex(raw_key.as_bytes());
        Ok((validation, hash))
    }

    /// Handles `tools/call` through the execution pipeline.
    fn handle_tools_call(&self, envelope: &JsonRpcEnvelope, headers: &RequestHeaders) -> Reply {
        let Some(name) = envelope.params.get("name").and_then(Value::as_str) else {
            return Reply::error_with_message(ErrorCode::InvalidParams, "tool name is required");
        };
        // Unknown tools surface ToolNotFound whatever the auth outcome
        // would have been.
        let Some(definition) = self.tools.get(name) else {
            self.audit.record_tool_call(&ToolCallAuditEvent::new(
                name.to_string(),
                envelope.id.as_ref().map(ToString::to_string),
                "not_found",
                Some(ErrorCode::ToolNotFound.code()),
            ));
            return Reply::error_with_message(
                ErrorCode::ToolNotFound,
                format!("tool not found: {name}"),
            );
        };
        let (validation, auth_key_hash) = match self.authenticate(&envelope.params, headers) {
            Ok(resolved) => resolved,
            Err(reply) => return reply,
        };
        let arguments = match envelope.params.get("arguments") {
            None => Map::new(),
            Some(Value::Object(arguments)) => arguments.clone(),
            Some(_) => {
                return Reply::error_with_message(
                    ErrorCode::InvalidParams,
                    "arguments must be an object",
                );
            }
        };
        let ctx = ToolContext {
            auth_key_hash,
            user_id: validation.user_id,
            is_admin: validation.is_admin,
            storage: self.store.clone(),
            env: self.tool_env(),
            debug_mode: validation.debug_mode,
            request_id: envelope.id.as_ref().map(ToString::to_string),
        };
        let request_id = ctx.request_id.clone();
        match execute_tool(definition, &arguments, &ctx) {
            Ok(success) => {
                let outcome = if success.warnings.is_empty() { "ok" } else { "ok_with_warnings" };
                self.audit.record_tool_call(&ToolCallAuditEvent::new(
                    name.to_string(),
                    request_id,
                    outcome,
                    None,
                ));
                Reply::Result(success.result)
            }
            Err(ToolCallError::GateBlocked {
                failures,
            }) => {
                self.audit.record_tool_call(&ToolCallAuditEvent::new(
                    name.to_string(),
                    request_id,
                    "gate_blocked",
                    Some(ErrorCode::QualityGateFailed.code()),
                ));
                Reply::Error {
                    code: ErrorCode::QualityGateFailed,
                    message: ErrorCode::QualityGateFailed.default_message().to_string(),
                    data: Some(json!({"checks": checks_to_value(&failures)})),
                }
            }
            Err(ToolCallError::Tool(error)) => {
                let reply = self.tool_error_reply(&error);
                let code = match &reply {
                    Reply::Error {
                        code, ..
                    } => code.code(),
                    Reply::Result(_) => ErrorCode::InternalError.code(),
                };
                self.audit.record_tool_call(&ToolCallAuditEvent::new(
                    name.to_string(),
                    request_id,
                    "error",
                    Some(code),
                ));
                reply
            }
        }
    }

    /// Handles `resources/read`.
    fn handle_resources_read(&self, envelope: &JsonRpcEnvelope, headers: &RequestHeaders) -> Reply {
        if let Err(reply) = self.authenticate(&envelope.params, headers) {
            return reply;
        }
        let Some(uri) = envelope.params.get("uri").and_then(Value::as_str) else {
            return Reply::error_with_message(ErrorCode::InvalidParams, "resource uri is required");
        };
        let Some(definition) = self.resources.get(uri) else {
            return Reply::error_with_message(
                ErrorCode::ResourceNotFound,
                format!("resource not found: {uri}"),
            );
        };
        match definition.reader.read(uri) {
            Ok(text) => Reply::Result(json!({
                "contents": [{
                    "uri": definition.uri,
                    "mimeType": definition.mime_type,
                    "text": text,
                }],
            })),
            Err(error) => self.tool_error_reply(&error),
        }
    }

    /// Handles `prompts/get`.
    fn handle_prompts_get(&self, envelope: &JsonRpcEnvelope, headers: &RequestHeaders) -> Reply {
        if let Err(reply) = self.authenticate(&envelope.params, headers) {
            return reply;
        }
        let Some(name) = envelope.params.get("name").and_then(Value::as_str) else {
            return Reply::error_with_message(ErrorCode::InvalidParams, "prompt name is required");
        };
        let Some(definition) = self.prompts.get(name) else {
            return Reply::error_with_message(
                ErrorCode::PromptNotFound,
                format!("prompt not found: {name}"),
            );
        };
        let arguments = match envelope.params.get("arguments") {
            None => Map::new(),
            Some(Value::Object(arguments)) => arguments.clone(),
            Some(_) => {
                return Reply::error_with_message(
                    ErrorCode::InvalidParams,
                    "arguments must be an object",
                );
            }
        };
        let missing = definition.missing_arguments(&arguments);
        if !missing.is_empty() {
            return Reply::error_with_message(
                ErrorCode::InvalidParams,
                format!("missing required arguments: {}", missing.join(", ")),
            );
        }
        let rendered = definition.render(&arguments);
        Reply::Result(json!({
            "description": definition.description,
            "messages": [{
                "role": "user",
                "content": {"type": "text", "text": rendered},
            }],
        }))
    }

    /// Handles `logging/setLevel`, side-effecting even as a notification.
    fn handle_set_level(&self, params: &Map<String, Value>) -> Reply {
        let Some(level) = params.get("level").and_then(Value::as_str) else {
            return Reply::error_with_message(ErrorCode::InvalidParams, "level is required");
        };
        let Some(level) = LogLevel::parse(level) else {
            return Reply::error_with_message(
                ErrorCode::InvalidParams,
                format!("unknown log level: {level}"),
            );
        };
        *self.log_level.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = level;
        Reply::Result(json!({}))
    }

    /// Maps a tool failure to a protocol error reply.
    fn tool_error_reply(&self, error: &ToolError) -> Reply {
        match error {
            ToolError::InvalidParams(detail) => {
                Reply::error_with_message(ErrorCode::InvalidParams, detail.clone())
            }
            ToolError::Execution(_) | ToolError::Storage(_) => Reply::error_with_message(
                ErrorCode::InternalError,
                self.surface_message(ErrorCode::InternalError, &error.to_string()),
            ),
        }
    }

    /// Redacts internal detail unless debug mode is on.
    fn surface_message(&self, code: ErrorCode, detail: &str) -> String {
        if self.config.server.debug {
            detail.to_string()
        } else {
            code.default_message().to_string()
        }
    }

    /// Builds the environment map exposed to tool invocations.
    fn tool_env(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("server_name".to_string(), self.config.server.name.clone()),
            ("server_version".to_string(), self.config.server.version.clone()),
            ("protocol_version".to_string(), self.config.server.protocol_version.clone()),
        ])
    }
}

/// Serializes quality checks for error data payloads.
fn checks_to_value(checks: &[QualityCheck]) -> Value {
    let checks: Vec<Value> = checks
        .iter()
        .map(|check| {
            json!({
                "name": check.name,
                "passed": check.passed,
                "message": check.message,
                "severity": match check.severity {
                    CheckSeverity::Error => "error",
                    CheckSeverity::Warning => "warning",
                },
            })
        })
        .collect();
    Value::Array(checks)
}
