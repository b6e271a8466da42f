//! Agent trait and types for the Relay multi-agent orchestrator.
//!
//! This crate defines the boundary between the orchestrator and the agents it
//! drives. An agent receives an [`Invocation`], reports the tools it runs as
//! [`TurnEvent::ToolInvocation`] items and ends its turn with one
//! [`AgentOutcome`].
//!
//! # Core Types
//!
//! - [`Agent`]: The trait every agent implements
//! - [`AgentTurn`]: The stream returned by [`Agent::invoke`]
//! - [`Invocation`]: Input for a turn (user message, routed message, continue)
//! - [`AgentMessage`]: Content plus attributes
//! - [`AgentOutcome`]: Tool permission request or user-facing response
//! - [`ToolCall`] / [`ToolInvocation`]: Requested and executed tool calls
//!
//! # Example
//!
//! ```ignore
//! use relay_agent::{completed_turn, Agent, AgentOutcome, AgentTurn, Invocation, Result};
//! use async_trait::async_trait;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Agent for Echo {
//!     fn name(&self) -> &str { "echo" }
//!     fn description(&self) -> &str { "Repeats what it hears" }
//!
//!     fn invoke(&mut self, invocation: Invocation) -> AgentTurn<'_> {
//!         let text = invocation.message().map(|m| m.content.to_text()).unwrap_or_default();
//!         completed_turn(Vec::new(), AgentOutcome::reply(text))
//!     }
//!
//!     async fn reset(&mut self) -> Result<()> { Ok(()) }
//! }
//! ```

pub mod agent;
pub mod error;
pub mod message;
pub mod outcome;
pub mod tool;

pub use agent::{completed_turn, failed_turn, Agent, AgentInfo, AgentTurn};
pub use error::{AgentError, Result};
pub use message::{
    AgentMessage, Attributes, ContentPart, Invocation, MessageContent, SharedFile, FILES_TO_SEND,
};
pub use outcome::{AgentOutcome, AgentResponse, ToolRequest, TurnEvent};
pub use tool::{ToolCall, ToolInvocation};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::StreamExt;
    use serde_json::json;

    /// Mock agent that asks for a tool, then answers once approved.
    struct MockAgent {
        name: String,
        awaiting_approval: Option<ToolCall>,
        resets: usize,
    }

    impl MockAgent {
        fn new(name: &str) -> Self {
            Self {
                name: name.into(),
                awaiting_approval: None,
                resets: 0,
            }
        }
    }

    #[async_trait]
    impl Agent for MockAgent {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            "test agent"
        }

        fn invoke(&mut self, invocation: Invocation) -> AgentTurn<'_> {
            match invocation {
                Invocation::Continue => match self.awaiting_approval.take() {
                    Some(call) => completed_turn(
                        vec![ToolInvocation::new(call.name, call.input.to_string(), "42")],
                        AgentOutcome::reply("the answer is 42"),
                    ),
                    None => failed_turn(AgentError::NothingToContinue(self.name.clone())),
                },
                _ => {
                    let call = ToolCall::new("compute", json!({"question": "everything"}));
                    self.awaiting_approval = Some(call.clone());
                    completed_turn(
                        Vec::new(),
                        AgentOutcome::tool_request("let me compute", vec![call]),
                    )
                }
            }
        }

        async fn reset(&mut self) -> Result<()> {
            self.awaiting_approval = None;
            self.resets += 1;
            Ok(())
        }
    }

    async fn drain(mut turn: AgentTurn<'_>) -> Vec<TurnEvent> {
        let mut events = Vec::new();
        while let Some(event) = turn.next().await {
            events.push(event.unwrap());
        }
        events
    }

    #[tokio::test]
    async fn test_mock_agent_tool_cycle() {
        let mut agent = MockAgent::new("calc");

        let events = drain(agent.invoke(Invocation::user("what is everything?"))).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            TurnEvent::Outcome(AgentOutcome::ToolPermissionRequest(req)) if req.tool_calls.len() == 1
        ));

        let events = drain(agent.invoke(Invocation::Continue)).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], TurnEvent::ToolInvocation(t) if t.output == "42"));
        assert!(matches!(
            &events[1],
            TurnEvent::Outcome(AgentOutcome::UserFacingResponse(r)) if r.message.content.to_text() == "the answer is 42"
        ));
    }

    #[tokio::test]
    async fn test_continue_without_pending_tools_fails() {
        let mut agent = MockAgent::new("calc");
        let mut turn = agent.invoke(Invocation::Continue);
        let first = turn.next().await.unwrap();
        assert!(matches!(first, Err(AgentError::NothingToContinue(name)) if name == "calc"));
    }

    #[tokio::test]
    async fn test_mock_agent_reset() {
        let mut agent = MockAgent::new("calc");
        let _ = drain(agent.invoke(Invocation::user("go"))).await;
        agent.reset().await.unwrap();

        assert_eq!(agent.resets, 1);
        assert!(agent.awaiting_approval.is_none());
    }

    #[test]
    fn test_agent_info_of_trait_object() {
        let agent: Box<dyn Agent> = Box::new(MockAgent::new("calc"));
        let info = AgentInfo::of(agent.as_ref());

        assert_eq!(info.name, "calc");
        assert_eq!(info.description, "test agent");
    }
}
