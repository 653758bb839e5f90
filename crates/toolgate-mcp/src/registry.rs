// crates/toolgate-mcp/src/registry.rs
// ============================================================================
// Module: Capability Registries
// Description: Tool, resource, and prompt registries owned by the router.
// Purpose: Hold the immutable name-to-definition maps that drive dispatch,
//          with duplicate registration treated as a caller error.
// Dependencies: serde_json, thiserror
// ============================================================================

//! ## Overview
//! Registries are plain maps owned by one router instance and injected where
//! needed; there is no process-wide singleton, so multiple independent
//! routers can coexist in one process. Definitions are registered once at
//! startup and immutable afterwards.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::tools::ToolContext;
use crate::tools::ToolError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Registry construction errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A definition with the same name is already registered.
    #[error("duplicate {kind} registration: {name}")]
    Duplicate {
        /// Registry kind label.
        kind: &'static str,
        /// Conflicting definition name.
        name: String,
    },
}

// ============================================================================
// SECTION: Quality Gates
// ============================================================================

/// Severity of a single quality check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckSeverity {
    /// Failing check blocks the response.
    Error,
    /// Failing check is recorded; the response still returns.
    Warning,
}

/// One check produced by a tool's quality gate.
#[derive(Debug, Clone)]
pub struct QualityCheck {
    /// Check name.
    pub name: String,
    /// Whether the check passed.
    pub passed: bool,
    /// Optional human-readable message.
    pub message: Option<String>,
    /// Severity when failing.
    pub severity: CheckSeverity,
    /// Optional numeric score for trend inspection.
    pub score: Option<f64>,
}

/// Aggregate quality-gate outcome for one invocation.
///
/// Produced after the handler runs and consumed immediately by the
/// pipeline; never persisted.
#[derive(Debug, Clone)]
pub struct QualityGateResult {
    /// Whether the gate passed overall.
    pub passed: bool,
    /// Individual checks.
    pub checks: Vec<QualityCheck>,
}

impl QualityGateResult {
    /// Returns true when any error-severity check failed.
    #[must_use]
    pub fn has_blocking_failure(&self) -> bool {
        self.checks
            .iter()
            .any(|check| !check.passed && check.severity == CheckSeverity::Error)
    }

    /// Returns the named numeric scores carried by the checks.
    #[must_use]
    pub fn scores(&self) -> Vec<(String, f64)> {
        self.checks
            .iter()
            .filter_map(|check| check.score.map(|score| (check.name.clone(), score)))
            .collect()
    }
}

// ============================================================================
// SECTION: Tool Definitions
// ============================================================================

/// Tool behavior plugged into the execution pipeline.
///
/// `execute` is required; the lifecycle hooks and the quality gate default
/// to no-ops. A tool with a quality gate returns `Some` from `quality_gate`
/// on every invocation, pass or fail; returning `None` means the tool
/// defines no gate.
pub trait ToolHandler: Send + Sync {
    /// Runs the tool against validated input.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] for invalid params or handler failures.
    fn execute(&self, input: &Map<String, Value>, ctx: &ToolContext) -> Result<Value, ToolError>;

    /// Hook run before the handler.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] to abort the invocation before the handler runs.
    fn before_execute(&self, _ctx: &ToolContext) -> Result<(), ToolError> {
        Ok(())
    }

    /// Hook run after the handler and quality gate.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] when post-invocation work fails.
    fn after_execute(&self, _ctx: &ToolContext) -> Result<(), ToolError> {
        Ok(())
    }

    /// Optional quality gate classifying the handler result.
    fn quality_gate(
        &self,
        _input: &Map<String, Value>,
        _result: &Value,
        _ctx: &ToolContext,
    ) -> Option<QualityGateResult> {
        None
    }
}

/// Registered tool definition.
#[derive(Clone)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON schema for tool input.
    pub input_schema: Value,
    /// Tool behavior.
    pub handler: Arc<dyn ToolHandler>,
}

impl ToolDefinition {
    /// Renders the listing descriptor for this tool.
    #[must_use]
    pub fn descriptor(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema,
        })
    }
}

/// Name-to-definition map for tools.
#[derive(Default)]
pub struct ToolRegistry {
    /// Registered tools in stable name order.
    tools: BTreeMap<String, ToolDefinition>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool definition.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] when the name is taken.
    pub fn register(&mut self, definition: ToolDefinition) -> Result<(), RegistryError> {
        if self.tools.contains_key(&definition.name) {
            return Err(RegistryError::Duplicate {
                kind: "tool",
                name: definition.name,
            });
        }
        self.tools.insert(definition.name.clone(), definition);
        Ok(())
    }

    /// Looks up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    /// Returns true when no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Renders the listing descriptors for all tools.
    #[must_use]
    pub fn descriptors(&self) -> Vec<Value> {
        self.tools.values().map(ToolDefinition::descriptor).collect()
    }
}

// ============================================================================
// SECTION: Resource Definitions
// ============================================================================

/// Resource content provider.
pub trait ResourceReader: Send + Sync {
    /// Reads the resource text content.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] when the content cannot be produced.
    fn read(&self, uri: &str) -> Result<String, ToolError>;
}

/// Registered resource definition.
#[derive(Clone)]
pub struct ResourceDefinition {
    /// Resource URI.
    pub uri: String,
    /// Resource name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// MIME type of the content.
    pub mime_type: String,
    /// Content provider.
    pub reader: Arc<dyn ResourceReader>,
}

impl ResourceDefinition {
    /// Renders the listing descriptor for this resource.
    #[must_use]
    pub fn descriptor(&self) -> Value {
        json!({
            "uri": self.uri,
            "name": self.name,
            "description": self.description,
            "mimeType": self.mime_type,
        })
    }
}

/// URI-to-definition map for resources.
#[derive(Default)]
pub struct ResourceRegistry {
    /// Registered resources in stable URI order.
    resources: BTreeMap<String, ResourceDefinition>,
}

impl ResourceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource definition.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] when the URI is taken.
    pub fn register(&mut self, definition: ResourceDefinition) -> Result<(), RegistryError> {
        if self.resources.contains_key(&definition.uri) {
            return Err(RegistryError::Duplicate {
                kind: "resource",
                name: definition.uri,
            });
        }
        self.resources.insert(definition.uri.clone(), definition);
        Ok(())
    }

    /// Looks up a resource by URI.
    #[must_use]
    pub fn get(&self, uri: &str) -> Option<&ResourceDefinition> {
        self.resources.get(uri)
    }

    /// Returns true when no resources are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Renders the listing descriptors for all resources.
    #[must_use]
    pub fn descriptors(&self) -> Vec<Value> {
        self.resources.values().map(ResourceDefinition::descriptor).collect()
    }
}

// ============================================================================
// SECTION: Prompt Definitions
// ============================================================================

/// Declared prompt argument.
#[derive(Debug, Clone)]
pub struct PromptArgument {
    /// Argument name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Whether the argument must be provided.
    pub required: bool,
}

/// Registered prompt template.
#[derive(Debug, Clone)]
pub struct PromptDefinition {
    /// Prompt name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Declared arguments.
    pub arguments: Vec<PromptArgument>,
    /// Template text with `{argument}` placeholders.
    pub template: String,
}

impl PromptDefinition {
    /// Renders the listing descriptor for this prompt.
    #[must_use]
    pub fn descriptor(&self) -> Value {
        let arguments: Vec<Value> = self
            .arguments
            .iter()
            .map(|argument| {
                json!({
                    "name": argument.name,
                    "description": argument.description,
                    "required": argument.required,
                })
            })
            .collect();
        json!({
            "name": self.name,
            "description": self.description,
            "arguments": arguments,
        })
    }

    /// Returns required argument names missing from the provided map.
    ///
    /// An argument present as an explicit empty string counts as provided;
    /// only absence counts as missing.
    #[must_use]
    pub fn missing_arguments(&self, provided: &Map<String, Value>) -> Vec<String> {
        self.arguments
            .iter()
            .filter(|argument| argument.required && !provided.contains_key(&argument.name))
            .map(|argument| argument.name.clone())
            .collect()
    }

    /// Renders the template by substituting `{argument}` placeholders.
    #[must_use]
    pub fn render(&self, provided: &Map<String, Value>) -> String {
        let mut rendered = self.template.clone();
        for (name, value) in provided {
            let placeholder = format!("{{{name}}}");
            let replacement = match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            rendered = rendered.replace(&placeholder, &replacement);
        }
        rendered
    }
}

/// Name-to-definition map for prompts.
#[derive(Default)]
pub struct PromptRegistry {
    /// Registered prompts in stable name order.
    prompts: BTreeMap<String, PromptDefinition>,
}

impl PromptRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a prompt definition.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] when the name is taken.
    pub fn register(&mut self, definition: PromptDefinition) -> Result<(), RegistryError> {
        if self.prompts.contains_key(&definition.name) {
            return Err(RegistryError::Duplicate {
                kind: "prompt",
                name: definition.name,
            });
        }
        self.prompts.insert(definition.name.clone(), definition);
        Ok(())
    }

    /// Looks up a prompt by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PromptDefinition> {
        self.prompts.get(name)
    }

    /// Returns true when no prompts are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// Renders the listing descriptors for all prompts.
    #[must_use]
    pub fn descriptors(&self) -> Vec<Value> {
        self.prompts.values().map(PromptDefinition::descriptor).collect()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
