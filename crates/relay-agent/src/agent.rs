//! Core Agent trait definition.
//!
//! An agent is a named, stateful conversational unit. The orchestrator drives
//! it one turn at a time through [`Agent::invoke`] and never looks inside: it
//! only sees the tool calls the agent reports and the outcome that ends the
//! turn.

use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::Invocation;
use crate::outcome::{AgentOutcome, TurnEvent};
use crate::tool::ToolInvocation;

/// A running agent turn.
///
/// Yields zero or more [`TurnEvent::ToolInvocation`] items followed by
/// exactly one [`TurnEvent::Outcome`]. Anything after the outcome is ignored.
pub type AgentTurn<'a> = Pin<Box<dyn Stream<Item = Result<TurnEvent>> + Send + 'a>>;

/// Name and description of a registered agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    /// Unique agent name.
    pub name: String,
    /// What the agent is for.
    pub description: String,
}

impl AgentInfo {
    /// Capture the identity of an agent.
    pub fn of(agent: &dyn Agent) -> Self {
        Self {
            name: agent.name().to_string(),
            description: agent.description().to_string(),
        }
    }
}

/// Core trait for agents driven by the orchestrator.
///
/// # Object Safety
///
/// This trait is object-safe; the orchestrator stores agents as
/// `Box<dyn Agent>`.
///
/// # Continuing after tool approval
///
/// A turn that ends in [`AgentOutcome::ToolPermissionRequest`] leaves the
/// agent mid-cycle. The next [`Invocation::Continue`] must resume that cycle
/// (run the approved tools, then carry on) rather than start a new turn.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Unique name of this agent.
    fn name(&self) -> &str;

    /// Short description, shown to peers and users.
    fn description(&self) -> &str;

    /// Start a turn.
    fn invoke(&mut self, invocation: Invocation) -> AgentTurn<'_>;

    /// Clear conversational state. Safe to call between any two turns.
    async fn reset(&mut self) -> Result<()>;
}

/// Build a turn whose events are already known.
///
/// Handy for agents that compute the whole turn up front.
pub fn completed_turn(tools: Vec<ToolInvocation>, outcome: AgentOutcome) -> AgentTurn<'static> {
    let events = tools
        .into_iter()
        .map(|tool| Ok(TurnEvent::ToolInvocation(tool)))
        .chain(std::iter::once(Ok(TurnEvent::Outcome(outcome))));
    Box::pin(stream::iter(events.collect::<Vec<_>>()))
}

/// Build a turn that fails immediately.
pub fn failed_turn(error: crate::AgentError) -> AgentTurn<'static> {
    Box::pin(stream::iter(vec![Err(error)]))
}
