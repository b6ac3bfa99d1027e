//! Error Types for Local Tools

use agent_core::AgentError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ToolError>;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Error {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Error executing command: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Command exited with {status}\n{output}")]
    CommandFailed { status: String, output: String },

    #[error("Path exists but is not a directory: {0}")]
    NotADirectory(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ToolError {
    pub(crate) fn io(action: &'static str, path: &str) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.to_string();
        move |source| ToolError::Io { action, path, source }
    }
}

impl From<ToolError> for AgentError {
    fn from(err: ToolError) -> Self {
        AgentError::ToolExecution(err.to_string())
    }
}
