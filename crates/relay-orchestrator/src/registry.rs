//! Agent registry: name-keyed storage for the agents an engine drives.
//!
//! The registry is filled while building the engine and is read-only once the
//! engine exists. Agents keep their registration order, which is the order
//! used for bulk operations such as reset.

use std::collections::HashMap;

use relay_agent::{Agent, AgentInfo};
use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

/// Position of an agent in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct AgentSlot(pub(crate) usize);

/// Which agents an agent may delegate to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Communication {
    /// Any registered agent.
    #[default]
    Any,
    /// Only the named agents.
    Only(Vec<String>),
}

impl Communication {
    /// Restrict delegation to the given names.
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(names.into_iter().map(Into::into).collect())
    }

    /// Whether delegating to `target` is permitted.
    pub fn allows(&self, target: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Only(names) => names.iter().any(|n| n == target),
        }
    }
}

struct AgentEntry {
    agent: Box<dyn Agent>,
    info: AgentInfo,
    communication: Communication,
}

/// Registry of agents keyed by name.
///
/// # Example
///
/// ```ignore
/// use relay_orchestrator::{AgentRegistry, Communication};
///
/// let mut registry = AgentRegistry::new();
/// registry.register(Box::new(alpha), Communication::Any)?;
///
/// if let Some(agent) = registry.lookup("alpha") {
///     println!("{}: {}", agent.name(), agent.description());
/// }
/// ```
#[derive(Default)]
pub struct AgentRegistry {
    entries: Vec<AgentEntry>,
    index: HashMap<String, AgentSlot>,
}

impl AgentRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an agent under its own name.
    ///
    /// Fails if the name is taken; an existing entry is never replaced.
    pub fn register(
        &mut self,
        agent: Box<dyn Agent>,
        communication: Communication,
    ) -> Result<AgentInfo> {
        let info = AgentInfo::of(agent.as_ref());
        if self.index.contains_key(&info.name) {
            return Err(OrchestratorError::DuplicateAgentName(info.name));
        }

        let slot = AgentSlot(self.entries.len());
        self.index.insert(info.name.clone(), slot);
        self.entries.push(AgentEntry {
            agent,
            info: info.clone(),
            communication,
        });
        Ok(info)
    }

    /// Gets an agent by name.
    pub fn lookup(&self, name: &str) -> Option<&dyn Agent> {
        self.slot_of(name).map(|slot| self.entries[slot.0].agent.as_ref())
    }

    /// Returns true if an agent with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All agents in registration order.
    pub fn all_agents(&self) -> impl Iterator<Item = &dyn Agent> {
        self.entries.iter().map(|entry| entry.agent.as_ref())
    }

    /// Name and description of every agent, in registration order.
    pub fn infos(&self) -> Vec<AgentInfo> {
        self.entries.iter().map(|entry| entry.info.clone()).collect()
    }

    /// Communication policy of an agent.
    pub fn communication(&self, name: &str) -> Option<&Communication> {
        self.slot_of(name)
            .map(|slot| &self.entries[slot.0].communication)
    }

    /// Whether `source` may hand a request to `target`.
    ///
    /// Only the whitelist is checked; `target` need not be registered.
    pub fn can_delegate(&self, source: &str, target: &str) -> bool {
        self.communication(source)
            .is_some_and(|communication| communication.allows(target))
    }

    /// Agents that `name` may delegate to, in registration order.
    ///
    /// Returns an empty list for an unknown name.
    pub fn reachable_agents(&self, name: &str) -> Vec<AgentInfo> {
        let Some(communication) = self.communication(name) else {
            return Vec::new();
        };
        self.entries
            .iter()
            .filter(|entry| entry.info.name != name && communication.allows(&entry.info.name))
            .map(|entry| entry.info.clone())
            .collect()
    }

    /// Returns the number of registered agents.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no agents are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn slot_of(&self, name: &str) -> Option<AgentSlot> {
        self.index.get(name).copied()
    }

    pub(crate) fn name(&self, slot: AgentSlot) -> &str {
        &self.entries[slot.0].info.name
    }

    pub(crate) fn agent_mut(&mut self, slot: AgentSlot) -> &mut dyn Agent {
        self.entries[slot.0].agent.as_mut()
    }

    pub(crate) fn agents_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Agent>> {
        self.entries.iter_mut().map(|entry| &mut entry.agent)
    }

    /// Names mentioned in whitelists that are not registered.
    pub(crate) fn dangling_whitelist_entries(&self) -> Vec<(String, String)> {
        let mut dangling = Vec::new();
        for entry in &self.entries {
            if let Communication::Only(names) = &entry.communication {
                for name in names {
                    if !self.contains(name) {
                        dangling.push((entry.info.name.clone(), name.clone()));
                    }
                }
            }
        }
        dangling
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|entry| &entry.info.name))
            .finish()
    }
}
