use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a tool call could not produce a result.
///
/// These travel back to the model as the tool's response, so they stay
/// serialisable and carry only text.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum AgentError {
    /// The model asked for a tool that is not registered
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// A second tool was registered under a name already in use
    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for AgentError {
    fn from(error: serde_json::Error) -> Self {
        AgentError::InvalidParameters(error.to_string())
    }
}

pub type AgentResult<T> = Result<T, AgentError>;
