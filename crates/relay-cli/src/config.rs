//! Agents file for the `relay` binary.
//!
//! The file is YAML and describes every agent the CLI should run:
//!
//! ```yaml
//! main_agent: planner
//! continuous_mode: false
//! max_delegation_depth: 8
//! agents:
//!   - name: planner
//!     description: Breaks requests down
//!     talks_to: [researcher]
//!     rules:
//!       - pattern: "(?i)weather"
//!         delegate_to: researcher
//!     fallback: "I can only plan."
//!   - name: researcher
//!     description: Looks things up
//!     rules:
//!       - pattern: ".*"
//!         tools:
//!           - name: search
//!             input: { query: "weather" }
//!             output: "sunny"
//!         reply: "Found: sunny ({input})"
//! ```
//!
//! # Location
//!
//! 1. `--config` (or `RELAY_CONFIG`) if given
//! 2. `~/.relay/agents.yaml`
//! 3. `.relay/agents.yaml` in the current directory when there is no home

use std::fs;
use std::path::{Path, PathBuf};

use relay_orchestrator::{Communication, Orchestrator, OrchestratorConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{CliError, Result};
use crate::scripted::ScriptedAgent;

/// Environment variable for a custom agents file.
pub const CONFIG_ENV: &str = "RELAY_CONFIG";

/// Default directory name under home.
const DEFAULT_DIR: &str = ".relay";

/// Default agents file name.
const DEFAULT_FILE: &str = "agents.yaml";

/// Resolve the agents file path.
///
/// An explicit path wins and has `~` expanded; otherwise the default under
/// the home directory is used.
pub fn resolve_path(explicit: Option<&str>) -> PathBuf {
    match explicit {
        Some(path) => PathBuf::from(shellexpand::tilde(path).to_string()),
        None => default_dir().join(DEFAULT_FILE),
    }
}

/// Relay's directory for user files.
pub fn default_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(DEFAULT_DIR))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DIR))
}

/// A tool a scripted rule runs once approved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name.
    pub name: String,
    /// Arguments shown in the permission request.
    #[serde(default)]
    pub input: Value,
    /// What the tool "returns" when run.
    #[serde(default)]
    pub output: String,
}

/// Which incoming messages a rule is tried against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleTrigger {
    /// User input, delegated requests and orchestrator notices.
    #[default]
    Request,
    /// Answers coming back from a delegate.
    Answer,
}

/// One pattern-triggered behaviour of a scripted agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Regular expression matched against the incoming text.
    pub pattern: String,
    /// Messages the rule applies to.
    #[serde(default)]
    pub when: RuleTrigger,
    /// Agent to hand the request to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegate_to: Option<String>,
    /// Tools to request before answering.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,
    /// Reply or delegation text; `{input}` is replaced by the incoming text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
}

/// One agent entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Unique agent name.
    pub name: String,
    /// What the agent is for.
    #[serde(default)]
    pub description: String,
    /// Marks the agent users talk to.
    #[serde(default)]
    pub main: bool,
    /// Agents this one may delegate to. Absent means any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub talks_to: Option<Vec<String>>,
    /// Rules, tried in order.
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
    /// Reply when no rule matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
}

impl AgentSpec {
    /// Communication policy for the engine.
    pub fn communication(&self) -> Communication {
        match &self.talks_to {
            Some(names) => Communication::only(names.iter().cloned()),
            None => Communication::Any,
        }
    }
}

/// Contents of the agents file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Agent users talk to, when more than one agent is defined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_agent: Option<String>,
    /// Approve tool requests without asking.
    #[serde(default)]
    pub continuous_mode: bool,
    /// Limit on nested delegations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delegation_depth: Option<usize>,
    /// Agent definitions.
    #[serde(default)]
    pub agents: Vec<AgentSpec>,
}

impl RelayConfig {
    /// Load and validate an agents file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::InvalidConfig(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_yaml::from_str(&content).map_err(|source| CliError::ConfigParse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        debug!(path = %path.display(), agents = config.agents.len(), "loaded agents file");
        Ok(config)
    }

    /// Parse and validate YAML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content).map_err(|source| CliError::ConfigParse {
            path: "<inline>".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the definitions without building anything.
    pub fn validate(&self) -> Result<()> {
        if self.agents.is_empty() {
            return Err(CliError::InvalidConfig("no agents defined".into()));
        }
        if let Some(spec) = self.agents.iter().find(|spec| spec.name.trim().is_empty()) {
            return Err(CliError::InvalidConfig(format!(
                "agent with description {:?} has no name",
                spec.description
            )));
        }
        self.orchestrator_config().validate()?;
        self.main_agent()?;
        Ok(())
    }

    /// Pick the agent users talk to.
    ///
    /// The only agent when there is one; otherwise `main_agent`; otherwise
    /// the first agent flagged `main`.
    pub fn main_agent(&self) -> Result<&str> {
        if let [only] = self.agents.as_slice() {
            return Ok(&only.name);
        }
        if let Some(name) = &self.main_agent {
            return self
                .agent(name)
                .map(|spec| spec.name.as_str())
                .ok_or_else(|| CliError::InvalidConfig(format!("main agent {} is not defined", name)));
        }
        self.agents
            .iter()
            .find(|spec| spec.main)
            .map(|spec| spec.name.as_str())
            .ok_or(CliError::NoMainAgent)
    }

    /// Look up an agent definition by name.
    pub fn agent(&self, name: &str) -> Option<&AgentSpec> {
        self.agents.iter().find(|spec| spec.name == name)
    }

    /// Engine settings from this file.
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        match self.max_delegation_depth {
            Some(depth) => OrchestratorConfig::new().with_max_delegation_depth(depth),
            None => OrchestratorConfig::new(),
        }
    }

    /// Build an engine running one scripted agent per entry.
    pub fn build_orchestrator(&self) -> Result<Orchestrator> {
        let mut builder = Orchestrator::builder().with_config(self.orchestrator_config());
        for spec in &self.agents {
            let agent = ScriptedAgent::from_spec(spec)?;
            builder.create_agent_with(agent, spec.communication())?;
        }
        Ok(builder.build(self.main_agent()?)?)
    }
}
