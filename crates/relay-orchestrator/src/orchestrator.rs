//! Delegation engine: drives one agent at a time and routes what it says.
//!
//! The engine keeps three pieces of state: the active agent, a LIFO stack of
//! agents waiting for control to come back, and at most one pending message
//! for the active agent. Each loop iteration runs one turn of the active
//! agent and then routes its outcome:
//!
//! - a tool permission request ends the run and leaves the state untouched,
//!   so a later [`Invocation::Continue`] resumes the same agent;
//! - a response naming another agent pushes the active agent, hands control
//!   to the target and emits a handoff event;
//! - a plain response either pops the stack and returns the reply to the
//!   waiting agent as [`Invocation::Returned`], or, with an empty stack, ends
//!   the run with a final reply.
//!
//! Delegation to an unknown agent, to an agent outside the delegator's
//! whitelist, or past the configured depth limit is answered with a notice
//! to the delegating agent, which gets another turn.

use futures::StreamExt;
use relay_agent::{Agent, AgentInfo, AgentMessage, AgentOutcome, AgentResponse, Invocation, TurnEvent};
use tracing::{debug, info, warn};

use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, Result};
use crate::event::{EngineResult, IntermediateEvent, Step, ToolPermissionRequest};
use crate::registry::{AgentRegistry, AgentSlot, Communication};
use crate::state::{DelegationState, PendingMessage};
use crate::stream::MessageStream;

/// What routing a response decided.
enum Routing {
    /// Control moved to another agent.
    Handoff(IntermediateEvent),
    /// Another turn follows without an event.
    Continue,
    /// The run is over.
    Finished(EngineResult),
}

/// Collects agents and configuration, then builds an [`Orchestrator`].
///
/// # Example
///
/// ```ignore
/// let mut builder = OrchestratorBuilder::new();
/// builder.create_agent(alpha)?;
/// builder.create_agent_with(beta, Communication::only(["alpha"]))?;
/// let mut orchestrator = builder.build("alpha")?;
/// ```
#[derive(Debug, Default)]
pub struct OrchestratorBuilder {
    registry: AgentRegistry,
    config: OrchestratorConfig,
}

impl OrchestratorBuilder {
    /// Create an empty builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the engine configuration.
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Register an agent that may delegate to any other agent.
    pub fn create_agent(&mut self, agent: impl Agent + 'static) -> Result<AgentInfo> {
        self.create_agent_with(agent, Communication::Any)
    }

    /// Register an agent with a communication whitelist.
    pub fn create_agent_with(
        &mut self,
        agent: impl Agent + 'static,
        communication: Communication,
    ) -> Result<AgentInfo> {
        let info = self.registry.register(Box::new(agent), communication)?;
        debug!(agent = %info.name, "registered agent");
        Ok(info)
    }

    /// Registered agents so far.
    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Build the engine with `initial_agent` as the agent users talk to.
    pub fn build(self, initial_agent: &str) -> Result<Orchestrator> {
        self.config.validate()?;
        if self.registry.is_empty() {
            return Err(OrchestratorError::NoAgents);
        }
        let initial = self
            .registry
            .slot_of(initial_agent)
            .ok_or_else(|| OrchestratorError::UnknownInitialAgent(initial_agent.to_string()))?;

        for (agent, missing) in self.registry.dangling_whitelist_entries() {
            warn!(agent = %agent, target = %missing, "whitelist names an unregistered agent");
        }

        info!(
            initial_agent = %initial_agent,
            agents = self.registry.len(),
            max_delegation_depth = ?self.config.max_delegation_depth,
            "orchestrator ready"
        );

        Ok(Orchestrator {
            registry: self.registry,
            state: DelegationState::new(initial),
            config: self.config,
        })
    }
}

/// The delegation engine.
///
/// Owns the agents and the delegation state. Runs are driven through
/// [`Orchestrator::handle_message`]; the returned stream borrows the engine
/// mutably, so only one run can be in progress at a time.
#[derive(Debug)]
pub struct Orchestrator {
    registry: AgentRegistry,
    state: DelegationState,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Start building an engine.
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Handle one invocation from the caller.
    ///
    /// The stream yields tool and handoff events as they happen and ends
    /// with a final reply or a tool permission request.
    ///
    /// If an earlier run was dropped while a message was waiting for
    /// delivery, the stream fails with
    /// [`OrchestratorError::PendingMessageOutstanding`] and nothing is
    /// consumed; call [`Orchestrator::resume`] first.
    pub fn handle_message(&mut self, invocation: Invocation) -> MessageStream<'_> {
        if self.state.pending.is_some() {
            let agent = self.active_agent().to_string();
            warn!(agent = %agent, "new message while a routed message is pending");
            return MessageStream::failed(OrchestratorError::PendingMessageOutstanding { agent });
        }
        self.run(Some(invocation))
    }

    /// Continue a run that was dropped with a message waiting for delivery.
    pub fn resume(&mut self) -> MessageStream<'_> {
        if self.state.pending.is_none() {
            return MessageStream::failed(OrchestratorError::NothingToResume);
        }
        info!(agent = %self.active_agent(), "resuming interrupted run");
        self.run(None)
    }

    /// Reset every agent and clear the delegation state.
    ///
    /// Agents are reset once each, in registration order, even when one of
    /// them fails; the first failure is returned afterwards. The initial
    /// agent becomes active again.
    pub async fn reset(&mut self) -> Result<()> {
        self.state.clear();
        let mut first_error = None;
        for agent in self.registry.agents_mut() {
            if let Err(e) = agent.reset().await {
                warn!(agent = %agent.name(), error = %e, "agent reset failed");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e.into());
        }
        info!(agents = self.registry.len(), "all agents reset");
        Ok(())
    }

    /// Name of the agent that gets the next turn.
    pub fn active_agent(&self) -> &str {
        self.registry.name(self.state.active)
    }

    /// Name of the agent users talk to.
    pub fn initial_agent(&self) -> &str {
        self.registry.name(self.state.initial)
    }

    /// Number of agents waiting for control to come back.
    pub fn delegation_depth(&self) -> usize {
        self.state.stack.len()
    }

    /// Waiting agents, the one that delegated first at index 0.
    pub fn delegation_chain(&self) -> Vec<&str> {
        self.state
            .stack
            .iter()
            .map(|slot| self.registry.name(slot))
            .collect()
    }

    /// True if a dropped run left a message waiting for delivery.
    pub fn has_pending_message(&self) -> bool {
        self.state.pending.is_some()
    }

    /// Every registered agent in registration order.
    pub fn agents(&self) -> Vec<AgentInfo> {
        self.registry.infos()
    }

    /// Agents that `name` may delegate to.
    pub fn reachable_agents(&self, name: &str) -> Vec<AgentInfo> {
        self.registry.reachable_agents(name)
    }

    /// The agent registry.
    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Engine configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    fn run(&mut self, supplied: Option<Invocation>) -> MessageStream<'_> {
        let this = self;
        MessageStream::new(async_stream::stream! {
            let mut supplied = supplied;
            loop {
                let input = match this.state.next_input(&mut supplied) {
                    Some(input) => input,
                    None => {
                        let item: Result<Step> = Err(OrchestratorError::NothingToResume);
                        yield item;
                        break;
                    }
                };

                let slot = this.state.active;
                let agent_name = this.registry.name(slot).to_string();
                debug!(agent = %agent_name, depth = this.state.stack.len(), "starting turn");

                let mut outcome = None;
                let mut failure = None;
                {
                    let mut turn = this.registry.agent_mut(slot).invoke(input);
                    while let Some(event) = turn.next().await {
                        match event {
                            Ok(TurnEvent::ToolInvocation(tool)) => {
                                debug!(agent = %agent_name, tool = %tool.tool_name, "tool invoked");
                                let item: Result<Step> = Ok(Step::Event(
                                    IntermediateEvent::tool_observed(&agent_name, tool),
                                ));
                                yield item;
                            }
                            Ok(TurnEvent::Outcome(finished)) => {
                                outcome = Some(finished);
                                break;
                            }
                            Err(error) => {
                                failure = Some(OrchestratorError::from(error));
                                break;
                            }
                        }
                    }
                }

                if let Some(error) = failure {
                    warn!(agent = %agent_name, error = %error, "agent turn failed");
                    let item: Result<Step> = Err(error);
                    yield item;
                    break;
                }
                let outcome = match outcome {
                    Some(outcome) => outcome,
                    None => {
                        warn!(agent = %agent_name, "turn ended without an outcome");
                        let item: Result<Step> = Err(OrchestratorError::MalformedOutput { agent: agent_name });
                        yield item;
                        break;
                    }
                };

                match outcome {
                    AgentOutcome::ToolPermissionRequest(request) => {
                        info!(
                            agent = %agent_name,
                            tools = request.tool_calls.len(),
                            "tool permission requested"
                        );
                        let item: Result<Step> = Ok(Step::Finished(
                            EngineResult::ToolPermissionRequest(ToolPermissionRequest {
                                calling_agent: agent_name,
                                content: request.content,
                                tool_calls: request.tool_calls,
                            }),
                        ));
                        yield item;
                        break;
                    }
                    AgentOutcome::UserFacingResponse(response) => match this.route(slot, response) {
                        Routing::Handoff(event) => {
                            let item: Result<Step> = Ok(Step::Event(event));
                            yield item;
                        }
                        Routing::Continue => {}
                        Routing::Finished(result) => {
                            let item: Result<Step> = Ok(Step::Finished(result));
                            yield item;
                            break;
                        }
                    },
                }
            }
        })
    }

    /// Commit the state change for a user-facing response.
    fn route(&mut self, source: AgentSlot, response: AgentResponse) -> Routing {
        let AgentResponse {
            message,
            target_agent,
        } = response;
        match target_agent {
            Some(target) => self.delegate(source, &target, message),
            None => self.reply(source, message),
        }
    }

    fn delegate(&mut self, source: AgentSlot, target: &str, message: AgentMessage) -> Routing {
        let source_name = self.registry.name(source).to_string();

        let Some(target_slot) = self.registry.slot_of(target) else {
            warn!(agent = %source_name, target = %target, "delegation to unknown agent");
            return self.redirect(format!("Agent {} does not exist.", target));
        };

        if !self.registry.can_delegate(&source_name, target) {
            warn!(agent = %source_name, target = %target, "delegation outside whitelist");
            return self.redirect(format!(
                "Agent {} is not allowed to talk to agent {}.",
                source_name, target
            ));
        }

        if let Some(max) = self.config.max_delegation_depth {
            if self.state.stack.len() >= max {
                warn!(agent = %source_name, target = %target, max, "delegation depth limit reached");
                return self.redirect(format!(
                    "Maximum delegation depth of {} reached. Agent {} cannot be contacted; reply with what you have.",
                    max, target
                ));
            }
        }

        self.state.stack.push(source);
        self.state.active = target_slot;
        self.state.pending = Some(PendingMessage::request(&source_name, message.clone()));
        info!(
            from = %source_name,
            to = %target,
            depth = self.state.stack.len(),
            "delegating"
        );
        Routing::Handoff(IntermediateEvent::handoff(&source_name, target, message))
    }

    fn reply(&mut self, source: AgentSlot, message: AgentMessage) -> Routing {
        let source_name = self.registry.name(source).to_string();
        match self.state.stack.pop() {
            None => {
                info!(agent = %source_name, "final reply");
                Routing::Finished(EngineResult::FinalReply {
                    content: message.content,
                    response_attributes: message.attributes,
                })
            }
            Some(previous) => {
                self.state.active = previous;
                self.state.pending = Some(PendingMessage::answer(&source_name, message));
                debug!(
                    from = %source_name,
                    to = %self.registry.name(previous),
                    depth = self.state.stack.len(),
                    "returning control"
                );
                Routing::Continue
            }
        }
    }

    /// Keep the active agent and stack; give the active agent a notice.
    fn redirect(&mut self, notice: String) -> Routing {
        self.state.pending = Some(PendingMessage::notice(notice));
        Routing::Continue
    }
}
