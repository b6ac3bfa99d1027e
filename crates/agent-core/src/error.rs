//! Error Types

use thiserror::Error;

use crate::tool::ValidationError;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
///
/// Tool-level variants (`ToolNotFound`, `ToolValidation`, `ToolExecution`) are
/// folded into a tool result by the executor and never end a turn. Provider and
/// tool-discovery variants are fatal to the process.
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unavailable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Tool not found in registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// A tool with the same name is already registered
    #[error("Duplicate tool name: {0}")]
    DuplicateToolName(String),

    /// Tool arguments did not match the declared parameters
    #[error("Tool validation error: {0}")]
    ToolValidation(#[from] ValidationError),

    /// Tool execution failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// The remote tool-discovery process could not be reached
    #[error("Tool discovery unavailable: {0}")]
    ToolDiscoveryUnavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Provider(msg) => format!("The AI service encountered an error: {msg}"),
            AgentError::ProviderUnavailable(_) => "The AI service is currently unavailable.".into(),
            AgentError::ToolNotFound(name) => format!("The tool '{name}' is not available."),
            AgentError::DuplicateToolName(name) => {
                format!("Two tools were registered under the name '{name}'.")
            }
            AgentError::ToolValidation(err) => format!("Invalid tool input: {err}"),
            AgentError::ToolExecution(msg) => format!("Tool error: {msg}"),
            AgentError::ToolDiscoveryUnavailable(msg) => {
                format!("Could not start the filesystem tool server: {msg}")
            }
            AgentError::Config(msg) => format!("Configuration problem: {msg}"),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Other(err.to_string())
    }
}
