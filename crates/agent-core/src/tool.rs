//! Tool System
//!
//! Tools declare their parameters as typed definitions, are validated before
//! dispatch, and are held in a registry that does not care whether a tool
//! runs in-process or behind the remote tool-discovery server.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::error::{AgentError, Result};

/// Tool call request from the LLM
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlates the result back to this request
    pub id: String,

    /// Tool identifier
    pub name: String,

    /// Untyped payload, validated against the tool's schema before use
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    /// New call with a generated ID
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), name, arguments)
    }

    pub fn with_id(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// How a tool invocation ended
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success(String),
    /// The user declined; carries the raw answer as feedback
    Cancelled(String),
    Failed(String),
}

/// Result from tool execution
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub name: String,
    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub fn success(call: &ToolCall, output: impl Into<String>) -> Self {
        Self::from_call(call, ToolOutcome::Success(output.into()))
    }

    pub fn cancelled(call: &ToolCall, feedback: impl Into<String>) -> Self {
        Self::from_call(call, ToolOutcome::Cancelled(feedback.into()))
    }

    pub fn failed(call: &ToolCall, error: impl Into<String>) -> Self {
        Self::from_call(call, ToolOutcome::Failed(error.into()))
    }

    fn from_call(call: &ToolCall, outcome: ToolOutcome) -> Self {
        Self {
            call_id: call.id.clone(),
            name: call.name.clone(),
            outcome,
        }
    }

    /// Single text payload fed back to the model
    pub fn to_text(&self) -> String {
        match &self.outcome {
            ToolOutcome::Success(output) => output.clone(),
            ToolOutcome::Cancelled(feedback) => {
                let mut text = format!("Tool '{}' was cancelled by the user.", self.name);
                let feedback = feedback.trim();
                if !feedback.is_empty() {
                    text.push_str("\nFeedback: ");
                    text.push_str(feedback);
                }
                text
            }
            ToolOutcome::Failed(error) => format!("[Tool '{}' failed]\n{}", self.name, error),
        }
    }
}

/// Accepted shape of a single parameter
#[derive(Clone, Debug, PartialEq)]
pub enum ParamType {
    String,
    Number,
    Boolean,
    StringArray,
    /// Nested shape described by a raw JSON schema; only presence is checked
    Json(Value),
}

impl ParamType {
    fn json_schema(&self) -> Value {
        match self {
            ParamType::String => serde_json::json!({ "type": "string" }),
            ParamType::Number => serde_json::json!({ "type": "number" }),
            ParamType::Boolean => serde_json::json!({ "type": "boolean" }),
            ParamType::StringArray => serde_json::json!({
                "type": "array",
                "items": { "type": "string" }
            }),
            ParamType::Json(schema) => schema.clone(),
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::StringArray => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            ParamType::Json(_) => true,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::StringArray => "array of strings",
            ParamType::Json(_) => "json",
        }
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    pub param_type: ParamType,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    pub required: bool,

    /// Reject empty strings
    pub non_empty: bool,
}

impl ParameterSchema {
    pub fn required(name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: true,
            non_empty: false,
        }
    }

    pub fn optional(name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    pub fn non_empty(mut self) -> Self {
        self.non_empty = true;
        self
    }
}

/// Structured argument validation failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("arguments must be a JSON object, got {0}")]
    NotAnObject(String),

    #[error("missing required parameter: {0}")]
    MissingField(String),

    #[error("unknown parameter: {0}")]
    UnknownField(String),

    #[error("parameter '{field}' must be a {expected}")]
    WrongType { field: String, expected: String },

    #[error("parameter '{0}' must not be empty")]
    Empty(String),
}

/// Tool definition schema (for LLM function calling)
#[derive(Clone, Debug, PartialEq)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,
}

impl ToolSchema {
    /// JSON schema object advertised to the model
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            let mut prop = param.param_type.json_schema();
            if let Value::Object(map) = &mut prop {
                if !param.description.is_empty() {
                    map.insert("description".into(), Value::String(param.description.clone()));
                }
            }
            properties.insert(param.name.clone(), prop);
        }
        let required: Vec<Value> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| Value::String(p.name.clone()))
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Check raw arguments against the declared parameters
    pub fn validate(&self, raw: &Value) -> std::result::Result<ToolArguments, ValidationError> {
        let empty = Map::new();
        let object = match raw {
            Value::Null => &empty,
            Value::Object(map) => map,
            other => return Err(ValidationError::NotAnObject(json_kind(other).into())),
        };

        if let Some(unknown) = object
            .keys()
            .find(|key| !self.parameters.iter().any(|p| &p.name == *key))
        {
            return Err(ValidationError::UnknownField(unknown.clone()));
        }

        let mut validated = Map::new();
        for param in &self.parameters {
            let value = match object.get(&param.name) {
                None | Some(Value::Null) => {
                    if param.required {
                        return Err(ValidationError::MissingField(param.name.clone()));
                    }
                    continue;
                }
                Some(value) => value,
            };

            if !param.param_type.accepts(value) {
                return Err(ValidationError::WrongType {
                    field: param.name.clone(),
                    expected: param.param_type.label().into(),
                });
            }
            if param.non_empty && value.as_str().is_some_and(str::is_empty) {
                return Err(ValidationError::Empty(param.name.clone()));
            }

            validated.insert(param.name.clone(), value.clone());
        }

        Ok(ToolArguments(validated))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Arguments that passed schema validation
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolArguments(Map<String, Value>);

impl ToolArguments {
    /// Required string argument
    pub fn str(&self, name: &str) -> Result<&str> {
        self.opt_str(name)
            .ok_or_else(|| ValidationError::MissingField(name.to_string()).into())
    }

    pub fn opt_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// String list argument; absent means empty
    pub fn str_list(&self, name: &str) -> Vec<&str> {
        self.0
            .get(name)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Compact `key=value` listing for confirmation prompts
    pub fn summary(&self) -> String {
        self.0
            .iter()
            .map(|(key, value)| match value {
                Value::String(s) => format!("{key}={s}"),
                other => format!("{key}={other}"),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema for LLM function calling
    fn schema(&self) -> ToolSchema;

    /// Human-readable description of the pending action, shown at the confirmation gate
    fn describe(&self, args: &ToolArguments) -> String {
        format!("Run tool '{}' with {}?", self.schema().name, args.summary())
    }

    /// Execute the tool with validated arguments
    async fn execute(&self, args: &ToolArguments) -> Result<String>;
}

/// A registry entry, tagged with where the tool runs
#[derive(Clone)]
pub enum RegisteredTool {
    Local(Arc<dyn Tool>),
    Remote(Arc<dyn Tool>),
}

impl RegisteredTool {
    pub fn tool(&self) -> &Arc<dyn Tool> {
        match self {
            RegisteredTool::Local(tool) | RegisteredTool::Remote(tool) => tool,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, RegisteredTool::Remote(_))
    }
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let origin = if self.is_remote() { "Remote" } else { "Local" };
        f.debug_tuple(origin).field(&self.tool().schema().name).finish()
    }
}

/// Registry for available tools
///
/// Built once at startup and shared read-only afterwards.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry; names must be unique
    pub fn register(&mut self, entry: RegisteredTool) -> Result<()> {
        let name = entry.tool().schema().name;
        if self.tools.contains_key(&name) {
            return Err(AgentError::DuplicateToolName(name));
        }
        self.tools.insert(name, entry);
        Ok(())
    }

    /// Register an in-process tool
    pub fn register_local<T: Tool + 'static>(&mut self, tool: T) -> Result<()> {
        self.register(RegisteredTool::Local(Arc::new(tool)))
    }

    /// Register a tool served by the remote tool-discovery process
    pub fn register_remote(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        self.register(RegisteredTool::Remote(tool))
    }

    /// Get a tool by name
    pub fn lookup(&self, name: &str) -> Result<&RegisteredTool> {
        self.tools
            .get(name)
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))
    }

    /// Full name-to-tool mapping
    pub fn all(&self) -> &BTreeMap<String, RegisteredTool> {
        &self.tools
    }

    /// Get all tool schemas, ordered by name
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.tool().schema()).collect()
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
