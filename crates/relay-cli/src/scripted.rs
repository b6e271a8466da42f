//! Rule-driven agents defined in the agents file.
//!
//! A scripted agent tries its rules in order against the text it receives.
//! The first matching rule decides the turn: it may ask for tools, hand the
//! request to another agent, or reply from a template. Requests are matched
//! against `request` rules and answers coming back from a delegate against
//! `answer` rules. An answer no rule matches is passed on unchanged.

use async_trait::async_trait;
use regex::Regex;
use relay_agent::{
    completed_turn, failed_turn, Agent, AgentError, AgentMessage, AgentOutcome, AgentResponse,
    AgentTurn, Attributes, Invocation, ToolCall, ToolInvocation,
};
use tracing::debug;

use crate::config::{AgentSpec, RuleTrigger, ToolSpec};
use crate::error::{CliError, Result};

/// Reply used when the agents file gives no fallback.
pub const DEFAULT_FALLBACK: &str = "Sorry, I don't know how to help with that.";

/// Placeholder replaced by the incoming text in reply templates.
const INPUT_PLACEHOLDER: &str = "{input}";

#[derive(Debug)]
struct Rule {
    pattern: Regex,
    when: RuleTrigger,
    delegate_to: Option<String>,
    tools: Vec<ToolSpec>,
    reply: Option<String>,
}

/// A matched rule waiting for tool approval.
#[derive(Debug)]
struct PendingTools {
    rule: usize,
    input: String,
    attributes: Attributes,
}

/// Agent that answers from pattern rules.
#[derive(Debug)]
pub struct ScriptedAgent {
    name: String,
    description: String,
    rules: Vec<Rule>,
    fallback: String,
    pending: Option<PendingTools>,
    awaiting: Option<String>,
}

impl ScriptedAgent {
    /// Compile an agent from its definition.
    pub fn from_spec(spec: &AgentSpec) -> Result<Self> {
        let rules = spec
            .rules
            .iter()
            .map(|rule| {
                let pattern = Regex::new(&rule.pattern).map_err(|source| CliError::Pattern {
                    agent: spec.name.clone(),
                    pattern: rule.pattern.clone(),
                    source,
                })?;
                Ok(Rule {
                    pattern,
                    when: rule.when,
                    delegate_to: rule.delegate_to.clone(),
                    tools: rule.tools.clone(),
                    reply: rule.reply.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: spec.name.clone(),
            description: spec.description.clone(),
            rules,
            fallback: spec
                .fallback
                .clone()
                .unwrap_or_else(|| DEFAULT_FALLBACK.to_string()),
            pending: None,
            awaiting: None,
        })
    }

    /// Agent this one delegated to and is waiting on.
    pub fn awaiting(&self) -> Option<&str> {
        self.awaiting.as_deref()
    }

    /// True if a tool request is waiting for approval.
    pub fn has_pending_tools(&self) -> bool {
        self.pending.is_some()
    }

    fn respond(&mut self, message: AgentMessage, trigger: RuleTrigger) -> AgentTurn<'static> {
        let input = message.content.to_text();
        self.pending = None;

        let matched = self
            .rules
            .iter()
            .position(|rule| rule.when == trigger && rule.pattern.is_match(&input));
        let Some(index) = matched else {
            debug!(agent = %self.name, ?trigger, "no rule matched");
            let outcome = match trigger {
                RuleTrigger::Request => AgentOutcome::reply(self.fallback.clone()),
                RuleTrigger::Answer => AgentOutcome::UserFacingResponse(AgentResponse {
                    message,
                    target_agent: None,
                }),
            };
            return completed_turn(Vec::new(), outcome);
        };

        if self.rules[index].tools.is_empty() {
            let outcome = self.answer(index, &input, message.attributes);
            return completed_turn(Vec::new(), outcome);
        }

        let rule = &self.rules[index];
        let calls: Vec<ToolCall> = rule
            .tools
            .iter()
            .map(|tool| ToolCall::new(&tool.name, tool.input.clone()))
            .collect();
        let names: Vec<&str> = rule.tools.iter().map(|tool| tool.name.as_str()).collect();
        let content = format!("I need to run: {}", names.join(", "));
        debug!(agent = %self.name, tools = calls.len(), "requesting tools");

        self.pending = Some(PendingTools {
            rule: index,
            input,
            attributes: message.attributes,
        });
        completed_turn(Vec::new(), AgentOutcome::tool_request(content, calls))
    }

    fn run_tools(&mut self, pending: PendingTools) -> AgentTurn<'static> {
        let tools: Vec<ToolInvocation> = self.rules[pending.rule]
            .tools
            .iter()
            .map(|tool| ToolInvocation::new(&tool.name, tool.input.to_string(), &tool.output))
            .collect();
        let outcome = self.answer(pending.rule, &pending.input, pending.attributes);
        completed_turn(tools, outcome)
    }

    /// Reply or delegate as the rule says.
    fn answer(&mut self, index: usize, input: &str, attributes: Attributes) -> AgentOutcome {
        let rule = &self.rules[index];
        let text = match &rule.reply {
            Some(template) => template.replace(INPUT_PLACEHOLDER, input),
            None => input.to_string(),
        };

        match &rule.delegate_to {
            Some(target) => {
                self.awaiting = Some(target.clone());
                AgentOutcome::UserFacingResponse(
                    AgentResponse::delegate(target.clone(), text).with_attributes(attributes),
                )
            }
            None => AgentOutcome::reply(text),
        }
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn invoke(&mut self, invocation: Invocation) -> AgentTurn<'_> {
        match invocation {
            Invocation::Continue => match self.pending.take() {
                Some(pending) => self.run_tools(pending),
                None => failed_turn(AgentError::NothingToContinue(self.name.clone())),
            },
            Invocation::Returned { sender, message } => {
                debug!(agent = %self.name, from = %sender, "answer returned");
                self.awaiting = None;
                self.respond(message, RuleTrigger::Answer)
            }
            Invocation::Routed { sender, message } => {
                if sender.is_none() {
                    // a notice means the last delegation never happened
                    self.awaiting = None;
                }
                self.respond(message, RuleTrigger::Request)
            }
            Invocation::User { message } => self.respond(message, RuleTrigger::Request),
        }
    }

    async fn reset(&mut self) -> relay_agent::Result<()> {
        self.pending = None;
        self.awaiting = None;
        Ok(())
    }
}
