//! Delegation orchestrator for the Relay multi-agent system.
//!
//! This crate provides the [`Orchestrator`], which routes messages between a
//! user and a set of named agents. Any agent may hand a request to a peer;
//! the peer's reply comes back to the agent that asked, and only a reply
//! with nobody left waiting reaches the user.
//!
//! # Overview
//!
//! The orchestrator manages:
//! - An [`AgentRegistry`] of uniquely named agents with optional
//!   communication whitelists
//! - The delegation stack of agents waiting for an answer
//! - Pausing on tool permission requests and resuming on approval
//!
//! Progress is reported through a [`MessageStream`] of intermediate events
//! followed by one [`EngineResult`].
//!
//! # Example
//!
//! ```ignore
//! use relay_orchestrator::{EngineResult, Invocation, Orchestrator, Step};
//! use futures::StreamExt;
//!
//! # async fn example() -> relay_orchestrator::Result<()> {
//! let mut builder = Orchestrator::builder();
//! builder.create_agent(planner)?;
//! builder.create_agent(researcher)?;
//! let mut orchestrator = builder.build("planner")?;
//!
//! let mut run = orchestrator.handle_message(Invocation::user("Plan a trip"));
//! while let Some(step) = run.next().await {
//!     match step? {
//!         Step::Event(event) => println!("{:?}", event),
//!         Step::Finished(EngineResult::FinalReply { content, .. }) => println!("{}", content),
//!         Step::Finished(EngineResult::ToolPermissionRequest(request)) => {
//!             println!("{} wants to run tools", request.calling_agent)
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod event;
mod orchestrator;
mod registry;
mod state;
mod stream;

pub use config::OrchestratorConfig;
pub use error::{OrchestratorError, Result};
pub use event::{EngineResult, IntermediateEvent, Step, ToolPermissionRequest};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use registry::{AgentRegistry, Communication};
pub use stream::{MessageStream, RunSummary};

// Re-export the agent boundary so callers need a single dependency
pub use relay_agent::{
    completed_turn, failed_turn, Agent, AgentError, AgentInfo, AgentMessage, AgentOutcome,
    AgentResponse, AgentTurn, Attributes, ContentPart, Invocation, MessageContent, SharedFile,
    ToolCall, ToolInvocation, ToolRequest, TurnEvent, FILES_TO_SEND,
};
