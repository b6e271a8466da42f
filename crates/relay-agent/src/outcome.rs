//! Turn outcome types.
//!
//! Every agent turn ends in exactly one [`AgentOutcome`]: either the agent
//! wants to run tools and needs the caller's approval, or it has something to
//! say. What it says goes back to whoever asked, unless it names another
//! agent, in which case the orchestrator hands control over.

use serde::{Deserialize, Serialize};

use crate::message::{AgentMessage, Attributes, MessageContent};
use crate::tool::{ToolCall, ToolInvocation};

/// Tool calls awaiting the caller's approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Text the agent produced alongside the request.
    pub content: MessageContent,

    /// The calls the agent wants to make.
    pub tool_calls: Vec<ToolCall>,
}

/// A structured response from an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    /// What the agent said, with its attributes.
    pub message: AgentMessage,

    /// Agent to hand the message to. `None` means a reply to the requester.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_agent: Option<String>,
}

impl AgentResponse {
    /// A reply to whoever sent the last message.
    pub fn reply(content: impl Into<MessageContent>) -> Self {
        Self {
            message: AgentMessage::new(content),
            target_agent: None,
        }
    }

    /// A request addressed to another agent.
    pub fn delegate(target: impl Into<String>, content: impl Into<MessageContent>) -> Self {
        Self {
            message: AgentMessage::new(content),
            target_agent: Some(target.into()),
        }
    }

    /// Replace the attributes of the message.
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.message.attributes = attributes;
        self
    }

    /// True if the response names a target agent.
    pub fn is_delegation(&self) -> bool {
        self.target_agent.is_some()
    }
}

impl std::fmt::Display for AgentResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message.content)?;
        if let Some(target) = &self.target_agent {
            write!(f, " [-> {}]", target)?;
        }
        Ok(())
    }
}

/// How an agent turn ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentOutcome {
    /// The agent wants to call tools and waits for approval.
    ToolPermissionRequest(ToolRequest),

    /// The agent replied or delegated.
    UserFacingResponse(AgentResponse),
}

impl AgentOutcome {
    /// Shorthand for a plain reply.
    pub fn reply(content: impl Into<MessageContent>) -> Self {
        Self::UserFacingResponse(AgentResponse::reply(content))
    }

    /// Shorthand for a delegation.
    pub fn delegate(target: impl Into<String>, content: impl Into<MessageContent>) -> Self {
        Self::UserFacingResponse(AgentResponse::delegate(target, content))
    }

    /// Shorthand for a tool permission request.
    pub fn tool_request(content: impl Into<MessageContent>, tool_calls: Vec<ToolCall>) -> Self {
        Self::ToolPermissionRequest(ToolRequest {
            content: content.into(),
            tool_calls,
        })
    }
}

/// One item of an agent turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// A tool the agent ran during the turn.
    ToolInvocation(ToolInvocation),

    /// The end of the turn.
    Outcome(AgentOutcome),
}
