//! Delegation state: who is active, who is waiting, and what to say next.

use relay_agent::{AgentMessage, Invocation};

use crate::registry::AgentSlot;

/// LIFO record of agents waiting for control to come back.
#[derive(Debug, Clone, Default)]
pub(crate) struct DelegationStack {
    frames: Vec<AgentSlot>,
}

impl DelegationStack {
    pub(crate) fn push(&mut self, slot: AgentSlot) {
        self.frames.push(slot);
    }

    pub(crate) fn pop(&mut self) -> Option<AgentSlot> {
        self.frames.pop()
    }

    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn clear(&mut self) {
        self.frames.clear();
    }

    /// Waiting agents, bottom of the stack first.
    pub(crate) fn iter(&self) -> impl Iterator<Item = AgentSlot> + '_ {
        self.frames.iter().copied()
    }
}

/// How a pending message reached the active agent.
#[derive(Debug, Clone, PartialEq)]
enum Route {
    Request(String),
    Answer(String),
    Notice,
}

/// The next message to deliver to the active agent.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PendingMessage {
    route: Route,
    message: AgentMessage,
}

impl PendingMessage {
    /// A request delegated by another agent.
    pub(crate) fn request(sender: impl Into<String>, message: AgentMessage) -> Self {
        Self {
            route: Route::Request(sender.into()),
            message,
        }
    }

    /// The answer of a delegate, going back to the agent that asked.
    pub(crate) fn answer(sender: impl Into<String>, message: AgentMessage) -> Self {
        Self {
            route: Route::Answer(sender.into()),
            message,
        }
    }

    /// A notice generated by the orchestrator itself.
    pub(crate) fn notice(text: impl Into<String>) -> Self {
        Self {
            route: Route::Notice,
            message: AgentMessage::new(text.into()),
        }
    }

    pub(crate) fn into_invocation(self) -> Invocation {
        let message = self.message;
        match self.route {
            Route::Request(sender) => Invocation::Routed {
                sender: Some(sender),
                message,
            },
            Route::Answer(sender) => Invocation::Returned { sender, message },
            Route::Notice => Invocation::Routed {
                sender: None,
                message,
            },
        }
    }
}

/// Mutable engine state. Only the engine writes to it.
#[derive(Debug)]
pub(crate) struct DelegationState {
    pub(crate) initial: AgentSlot,
    pub(crate) active: AgentSlot,
    pub(crate) stack: DelegationStack,
    pub(crate) pending: Option<PendingMessage>,
}

impl DelegationState {
    pub(crate) fn new(initial: AgentSlot) -> Self {
        Self {
            initial,
            active: initial,
            stack: DelegationStack::default(),
            pending: None,
        }
    }

    /// Input for the next turn: the pending message if there is one,
    /// otherwise the caller's invocation. Both are consumed.
    pub(crate) fn next_input(&mut self, supplied: &mut Option<Invocation>) -> Option<Invocation> {
        match self.pending.take() {
            Some(pending) => Some(pending.into_invocation()),
            None => supplied.take(),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.stack.clear();
        self.pending = None;
        self.active = self.initial;
    }
}
