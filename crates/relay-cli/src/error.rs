//! Error types for the CLI.

use thiserror::Error;

/// Errors that can occur in the CLI.
#[derive(Error, Debug)]
pub enum CliError {
    /// Reading a file or talking to the terminal failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The agents file is not valid YAML for a relay config.
    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        /// File that failed to parse.
        path: String,
        /// Parser error.
        source: serde_yaml::Error,
    },

    /// The agents file parsed but describes an unusable setup.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// No agent could be picked as the one users talk to.
    #[error("No main agent found")]
    NoMainAgent,

    /// A rule pattern is not a valid regular expression.
    #[error("agent {agent}: invalid pattern {pattern:?}: {source}")]
    Pattern {
        /// Agent owning the rule.
        agent: String,
        /// The pattern as written.
        pattern: String,
        /// Regex compile error.
        source: regex::Error,
    },

    /// The engine reported an error.
    #[error(transparent)]
    Orchestrator(#[from] relay_orchestrator::OrchestratorError),

    /// Line editor failure.
    #[error("readline error: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),
}

/// Result type for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;
