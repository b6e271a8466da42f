//! Events and results produced by the orchestrator.

use relay_agent::{AgentMessage, Attributes, MessageContent, SharedFile, ToolCall, ToolInvocation};
use serde::{Deserialize, Serialize};

/// Progress observed while a message is being handled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntermediateEvent {
    /// An agent ran a tool during its turn.
    ToolInvocationObserved {
        /// Agent that ran the tool.
        agent_name: String,
        /// Tool name.
        tool_name: String,
        /// Tool input.
        input: String,
        /// Tool output.
        output: String,
    },

    /// Control moved from one agent to another.
    AgentToAgentHandoff {
        /// Delegating agent.
        source_agent: String,
        /// Agent that now has control.
        destination_agent: String,
        /// The delegated request.
        content: MessageContent,
        /// Attributes travelling with the request.
        response_attributes: Attributes,
    },
}

impl IntermediateEvent {
    pub(crate) fn tool_observed(agent_name: &str, tool: ToolInvocation) -> Self {
        Self::ToolInvocationObserved {
            agent_name: agent_name.to_string(),
            tool_name: tool.tool_name,
            input: tool.input,
            output: tool.output,
        }
    }

    pub(crate) fn handoff(source: &str, destination: &str, message: AgentMessage) -> Self {
        Self::AgentToAgentHandoff {
            source_agent: source.to_string(),
            destination_agent: destination.to_string(),
            content: message.content,
            response_attributes: message.attributes,
        }
    }

    /// Returns the agent the event belongs to: the tool runner, or the
    /// delegating agent for a handoff.
    pub fn agent_name(&self) -> &str {
        match self {
            Self::ToolInvocationObserved { agent_name, .. } => agent_name,
            Self::AgentToAgentHandoff { source_agent, .. } => source_agent,
        }
    }

    /// Returns true if this is a handoff event.
    pub fn is_handoff(&self) -> bool {
        matches!(self, Self::AgentToAgentHandoff { .. })
    }
}

/// Tool calls waiting for the caller's decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolPermissionRequest {
    /// Agent that wants to run the tools.
    pub calling_agent: String,
    /// Text the agent produced alongside the request.
    pub content: MessageContent,
    /// Requested calls.
    pub tool_calls: Vec<ToolCall>,
}

/// How handling a message ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineResult {
    /// A reply reached the original caller.
    FinalReply {
        /// Reply content.
        content: MessageContent,
        /// Reply attributes.
        response_attributes: Attributes,
    },

    /// An agent needs approval before running tools.
    ToolPermissionRequest(ToolPermissionRequest),
}

impl EngineResult {
    /// Reply content, if this is a final reply.
    pub fn reply(&self) -> Option<&MessageContent> {
        match self {
            Self::FinalReply { content, .. } => Some(content),
            Self::ToolPermissionRequest(_) => None,
        }
    }

    /// Files shared with the caller by a final reply.
    pub fn shared_files(&self) -> Vec<SharedFile> {
        match self {
            Self::FinalReply {
                content,
                response_attributes,
            } => AgentMessage::new(content.clone())
                .with_attributes(response_attributes.clone())
                .shared_files(),
            Self::ToolPermissionRequest(_) => Vec::new(),
        }
    }

    /// Returns true if the caller must decide on tool calls.
    pub fn is_tool_request(&self) -> bool {
        matches!(self, Self::ToolPermissionRequest(_))
    }
}

/// One item of a [`crate::MessageStream`].
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Progress; more items follow.
    Event(IntermediateEvent),
    /// The terminal result; nothing follows.
    Finished(EngineResult),
}
