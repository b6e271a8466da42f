//! Error types for the agent crate.

use thiserror::Error;

/// Errors that an agent can report while running a turn.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Tool execution failed.
    #[error("tool execution failed: {tool_name}: {message}")]
    ToolExecution {
        /// Name of the tool that failed.
        tool_name: String,
        /// Error message.
        message: String,
    },

    /// Tool not found.
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Model invocation failed.
    #[error("model invocation failed: {0}")]
    ModelInvocation(String),

    /// The model output could not be read as a tool request or a response.
    #[error("failed to parse response: {0}")]
    ResponseParse(String),

    /// `Continue` was sent while no tool cycle was in progress.
    #[error("agent {0} has no tool request awaiting approval")]
    NothingToContinue(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
