//! Error types for the orchestrator.

use thiserror::Error;

/// Orchestrator-specific errors.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Agent error.
    #[error("Agent error: {0}")]
    Agent(#[from] relay_agent::AgentError),

    /// An agent with this name is already registered.
    #[error("Duplicate agent name: {0}")]
    DuplicateAgentName(String),

    /// An engine cannot be built without agents.
    #[error("No agents registered")]
    NoAgents,

    /// The requested initial agent is not registered.
    #[error("Initial agent not found: {0}")]
    UnknownInitialAgent(String),

    /// A turn ended without a tool request or a response.
    #[error("Agent {agent} finished its turn without a tool request or a response")]
    MalformedOutput {
        /// Agent whose turn was malformed.
        agent: String,
    },

    /// A previous run stopped with a message still waiting for delivery.
    #[error("A message for agent {agent} is still pending; resume the interrupted run first")]
    PendingMessageOutstanding {
        /// Agent the pending message is addressed to.
        agent: String,
    },

    /// `resume` was called without an interrupted run.
    #[error("Nothing to resume")]
    NothingToResume,

    /// The message stream ended before producing a result.
    #[error("Message stream ended without a result")]
    StreamExhausted,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
