//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

/// Configuration for the orchestration engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum number of agents waiting on the delegation stack.
    ///
    /// `None` leaves delegation unbounded: two agents that keep delegating
    /// to each other will never return. When set, a delegation that would
    /// exceed the limit is refused and the delegating agent is told so.
    #[serde(default)]
    pub max_delegation_depth: Option<usize>,
}

impl OrchestratorConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum delegation depth.
    pub fn with_max_delegation_depth(mut self, depth: usize) -> Self {
        self.max_delegation_depth = Some(depth);
        self
    }

    /// Removes the delegation depth limit.
    pub fn unbounded(mut self) -> Self {
        self.max_delegation_depth = None;
        self
    }

    /// Checks the values for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.max_delegation_depth == Some(0) {
            return Err(OrchestratorError::Configuration(
                "max_delegation_depth must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
