//! Integration tests for delegation, tool permission and reset handling.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use relay_orchestrator::{
    completed_turn, failed_turn, Agent, AgentError, AgentMessage, AgentOutcome, AgentResponse,
    AgentTurn, Communication, EngineResult, IntermediateEvent, Invocation, Orchestrator,
    OrchestratorConfig, OrchestratorError, SharedFile, Step, ToolCall, ToolInvocation,
};
use serde_json::json;

/// One scripted turn.
enum Turn {
    Finish(Vec<ToolInvocation>, AgentOutcome),
    NoOutcome,
    Fail(&'static str),
}

fn reply(text: &str) -> Turn {
    Turn::Finish(Vec::new(), AgentOutcome::reply(text))
}

fn delegate(target: &str, text: &str) -> Turn {
    Turn::Finish(Vec::new(), AgentOutcome::delegate(target, text))
}

/// What a test can still see after the agent moved into the engine.
#[derive(Clone, Default)]
struct Probe {
    invocations: Arc<Mutex<Vec<Invocation>>>,
    resets: Arc<AtomicUsize>,
}

impl Probe {
    fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// Text of every message the agent received, `<continue>` for continues.
    fn received(&self) -> Vec<String> {
        self.invocations()
            .iter()
            .map(|invocation| match invocation.message() {
                Some(message) => message.content.to_text(),
                None => "<continue>".to_string(),
            })
            .collect()
    }

    fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

/// Agent that plays back a queue of turns.
struct QueueAgent {
    name: String,
    turns: VecDeque<Turn>,
    probe: Probe,
    reset_fails: bool,
}

fn scripted(name: &str, turns: Vec<Turn>) -> (QueueAgent, Probe) {
    let probe = Probe::default();
    let agent = QueueAgent {
        name: name.to_string(),
        turns: turns.into(),
        probe: probe.clone(),
        reset_fails: false,
    };
    (agent, probe)
}

#[async_trait]
impl Agent for QueueAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "plays back scripted turns"
    }

    fn invoke(&mut self, invocation: Invocation) -> AgentTurn<'_> {
        self.probe.invocations.lock().unwrap().push(invocation);
        match self.turns.pop_front() {
            Some(Turn::Finish(tools, outcome)) => completed_turn(tools, outcome),
            Some(Turn::NoOutcome) => Box::pin(futures::stream::empty()),
            Some(Turn::Fail(message)) => failed_turn(AgentError::ModelInvocation(message.into())),
            None => failed_turn(AgentError::ModelInvocation(format!(
                "{} ran out of turns",
                self.name
            ))),
        }
    }

    async fn reset(&mut self) -> relay_agent::Result<()> {
        self.probe.resets.fetch_add(1, Ordering::SeqCst);
        if self.reset_fails {
            return Err(AgentError::Configuration(format!(
                "{} cannot forget",
                self.name
            )));
        }
        Ok(())
    }
}

fn handoff(source: &str, destination: &str, text: &str) -> IntermediateEvent {
    IntermediateEvent::AgentToAgentHandoff {
        source_agent: source.into(),
        destination_agent: destination.into(),
        content: text.into(),
        response_attributes: Default::default(),
    }
}

fn tool_event(agent: &str, tool: &str) -> IntermediateEvent {
    IntermediateEvent::ToolInvocationObserved {
        agent_name: agent.into(),
        tool_name: tool.into(),
        input: "{}".into(),
        output: format!("{} output", tool),
    }
}

fn final_text(result: &EngineResult) -> String {
    result.reply().map(|content| content.to_text()).unwrap_or_default()
}

#[tokio::test]
async fn test_direct_reply() {
    let (alpha, alpha_probe) = scripted("alpha", vec![reply("hi")]);
    let mut builder = Orchestrator::builder();
    builder.create_agent(alpha).unwrap();
    let mut orchestrator = builder.build("alpha").unwrap();

    let summary = orchestrator
        .handle_message(Invocation::user("hello"))
        .collect()
        .await
        .unwrap();

    assert!(summary.events.is_empty());
    assert_eq!(final_text(&summary.result), "hi");
    assert_eq!(alpha_probe.received(), vec!["hello"]);
    assert!(matches!(alpha_probe.invocations()[0], Invocation::User { .. }));
}

#[tokio::test]
async fn test_delegation_and_return() {
    let (alpha, alpha_probe) = scripted("alpha", vec![delegate("beta", "question"), reply("answer")]);
    let (beta, beta_probe) = scripted("beta", vec![reply("answer")]);
    let mut builder = Orchestrator::builder();
    builder.create_agent(alpha).unwrap();
    builder.create_agent(beta).unwrap();
    let mut orchestrator = builder.build("alpha").unwrap();

    let mut run = orchestrator.handle_message(Invocation::user("ask beta"));
    let first = run.next_step().await.unwrap().unwrap();
    assert_eq!(first, Step::Event(handoff("alpha", "beta", "question")));
    let result = run.finish().await.unwrap();

    assert_eq!(final_text(&result), "answer");
    assert_eq!(orchestrator.delegation_depth(), 0);
    assert_eq!(orchestrator.active_agent(), "alpha");

    let beta_calls = beta_probe.invocations();
    assert_eq!(beta_calls.len(), 1);
    assert_eq!(beta_calls[0].sender(), Some("alpha"));
    assert_eq!(beta_probe.received(), vec!["question"]);

    let alpha_calls = alpha_probe.invocations();
    assert_eq!(alpha_calls[1].sender(), Some("beta"));
    assert!(alpha_calls[1].is_return());
    assert!(!beta_calls[0].is_return());
    assert_eq!(alpha_probe.received(), vec!["ask beta", "answer"]);
}

#[tokio::test]
async fn test_mutual_delegation_marks_requests_and_answers() {
    let (alpha, alpha_probe) = scripted(
        "alpha",
        vec![
            delegate("beta", "weather?"),
            reply("Oslo"),
            reply("Oslo is sunny"),
        ],
    );
    let (beta, beta_probe) = scripted(
        "beta",
        vec![delegate("alpha", "which city?"), reply("Oslo is sunny")],
    );
    let mut builder = Orchestrator::builder();
    builder.create_agent(alpha).unwrap();
    builder.create_agent(beta).unwrap();
    let mut orchestrator = builder.build("alpha").unwrap();

    let summary = orchestrator
        .handle_message(Invocation::user("weather please"))
        .collect()
        .await
        .unwrap();

    assert_eq!(
        summary.events,
        vec![
            handoff("alpha", "beta", "weather?"),
            handoff("beta", "alpha", "which city?"),
        ]
    );
    assert_eq!(final_text(&summary.result), "Oslo is sunny");
    assert_eq!(orchestrator.delegation_depth(), 0);

    // alpha gets the user, then beta's follow-up question, then beta's answer
    let alpha_calls = alpha_probe.invocations();
    assert!(matches!(alpha_calls[0], Invocation::User { .. }));
    assert_eq!(alpha_calls[1].sender(), Some("beta"));
    assert!(!alpha_calls[1].is_return());
    assert_eq!(alpha_calls[2].sender(), Some("beta"));
    assert!(alpha_calls[2].is_return());

    let beta_calls = beta_probe.invocations();
    assert!(!beta_calls[0].is_return());
    assert!(matches!(&beta_calls[1], Invocation::Returned { sender, .. } if sender == "alpha"));
    assert_eq!(beta_probe.received(), vec!["weather?", "Oslo"]);
}

#[tokio::test]
async fn test_unknown_target_is_corrected() {
    let (alpha, alpha_probe) = scripted("alpha", vec![delegate("gamma", "hi"), reply("done")]);
    let mut builder = Orchestrator::builder();
    builder.create_agent(alpha).unwrap();
    let mut orchestrator = builder.build("alpha").unwrap();

    let summary = orchestrator
        .handle_message(Invocation::user("talk to gamma"))
        .collect()
        .await
        .unwrap();

    assert!(summary.events.is_empty());
    assert_eq!(final_text(&summary.result), "done");
    assert_eq!(
        alpha_probe.received(),
        vec!["talk to gamma", "Agent gamma does not exist."]
    );
    assert_eq!(alpha_probe.invocations()[1].sender(), None);
    assert_eq!(orchestrator.delegation_depth(), 0);
}

#[tokio::test]
async fn test_deep_chain_unwinds() {
    let names = ["a", "b", "c", "d", "e"];
    let mut builder = Orchestrator::builder();
    let mut probes = Vec::new();
    for (i, name) in names.iter().enumerate() {
        let turns = match names.get(i + 1) {
            Some(next) => vec![delegate(next, &format!("to {}", next)), reply(&format!("{} done", name))],
            None => vec![reply("bottom")],
        };
        let (agent, probe) = scripted(name, turns);
        builder.create_agent(agent).unwrap();
        probes.push(probe);
    }
    let mut orchestrator = builder.build("a").unwrap();

    let summary = orchestrator
        .handle_message(Invocation::user("go"))
        .collect()
        .await
        .unwrap();

    let expected: Vec<IntermediateEvent> = names
        .windows(2)
        .map(|pair| handoff(pair[0], pair[1], &format!("to {}", pair[1])))
        .collect();
    assert_eq!(summary.events, expected);
    assert_eq!(final_text(&summary.result), "a done");
    assert_eq!(orchestrator.delegation_depth(), 0);

    // each agent hears the reply of the one it delegated to
    assert_eq!(probes[3].received(), vec!["to d", "bottom"]);
    assert_eq!(probes[0].received(), vec!["go", "b done"]);
}

#[tokio::test]
async fn test_chain_is_visible_mid_flow() {
    let (alpha, _) = scripted("alpha", vec![delegate("beta", "q")]);
    let (beta, _) = scripted("beta", vec![delegate("gamma", "q2")]);
    let (gamma, _) = scripted("gamma", vec![Turn::Finish(
        Vec::new(),
        AgentOutcome::tool_request("need ls", vec![ToolCall::new("ls", json!({}))]),
    )]);
    let mut builder = Orchestrator::builder();
    builder.create_agent(alpha).unwrap();
    builder.create_agent(beta).unwrap();
    builder.create_agent(gamma).unwrap();
    let mut orchestrator = builder.build("alpha").unwrap();

    orchestrator
        .handle_message(Invocation::user("start"))
        .finish()
        .await
        .unwrap();

    assert_eq!(orchestrator.delegation_chain(), vec!["alpha", "beta"]);
    assert_eq!(orchestrator.delegation_depth(), 2);
    assert_eq!(orchestrator.active_agent(), "gamma");
}

#[tokio::test]
async fn test_tool_request_pauses_and_continue_resumes() {
    let (alpha, alpha_probe) = scripted("alpha", vec![delegate("beta", "list files"), reply("beta says a.txt")]);
    let (beta, beta_probe) = scripted(
        "beta",
        vec![
            Turn::Finish(
                Vec::new(),
                AgentOutcome::tool_request("may I run ls?", vec![ToolCall::new("ls", json!({}))]),
            ),
            Turn::Finish(
                vec![ToolInvocation::new("ls", "{}", "ls output")],
                AgentOutcome::reply("a.txt"),
            ),
        ],
    );
    let mut builder = Orchestrator::builder();
    builder.create_agent(alpha).unwrap();
    builder.create_agent(beta).unwrap();
    let mut orchestrator = builder.build("alpha").unwrap();

    let summary = orchestrator
        .handle_message(Invocation::user("what is here?"))
        .collect()
        .await
        .unwrap();
    assert_eq!(summary.events, vec![handoff("alpha", "beta", "list files")]);
    match &summary.result {
        EngineResult::ToolPermissionRequest(request) => {
            assert_eq!(request.calling_agent, "beta");
            assert_eq!(request.content.to_text(), "may I run ls?");
            assert_eq!(request.tool_calls[0].name, "ls");
        }
        other => panic!("expected a tool request, got {:?}", other),
    }

    // nothing moved while waiting for approval
    assert_eq!(orchestrator.active_agent(), "beta");
    assert_eq!(orchestrator.delegation_chain(), vec!["alpha"]);
    assert!(!orchestrator.has_pending_message());

    let summary = orchestrator
        .handle_message(Invocation::Continue)
        .collect()
        .await
        .unwrap();
    assert_eq!(summary.events, vec![tool_event("beta", "ls")]);
    assert_eq!(final_text(&summary.result), "beta says a.txt");

    assert!(beta_probe.invocations()[1].is_continue());
    assert_eq!(alpha_probe.received(), vec!["what is here?", "a.txt"]);
    assert_eq!(orchestrator.delegation_depth(), 0);
}

#[tokio::test]
async fn test_tool_events_precede_handoff() {
    let (alpha, _) = scripted(
        "alpha",
        vec![
            Turn::Finish(
                vec![
                    ToolInvocation::new("search", "{}", "search output"),
                    ToolInvocation::new("fetch", "{}", "fetch output"),
                    ToolInvocation::new("read", "{}", "read output"),
                ],
                AgentOutcome::delegate("beta", "summarize"),
            ),
            reply("summary"),
        ],
    );
    let (beta, _) = scripted("beta", vec![reply("summary")]);
    let mut builder = Orchestrator::builder();
    builder.create_agent(alpha).unwrap();
    builder.create_agent(beta).unwrap();
    let mut orchestrator = builder.build("alpha").unwrap();

    let summary = orchestrator
        .handle_message(Invocation::user("research"))
        .collect()
        .await
        .unwrap();

    assert_eq!(
        summary.events,
        vec![
            tool_event("alpha", "search"),
            tool_event("alpha", "fetch"),
            tool_event("alpha", "read"),
            handoff("alpha", "beta", "summarize"),
        ]
    );
}

#[tokio::test]
async fn test_handoff_carries_attributes() {
    let files = [SharedFile::new("report.md", "/tmp/report.md")];
    let attributes = AgentMessage::new("").with_shared_files(&files).attributes;
    let (alpha, _) = scripted(
        "alpha",
        vec![
            Turn::Finish(
                Vec::new(),
                AgentOutcome::UserFacingResponse(
                    AgentResponse::delegate("beta", "review this").with_attributes(attributes.clone()),
                ),
            ),
            Turn::Finish(
                Vec::new(),
                AgentOutcome::UserFacingResponse(
                    AgentResponse::reply("reviewed").with_attributes(attributes.clone()),
                ),
            ),
        ],
    );
    let (beta, beta_probe) = scripted("beta", vec![reply("looks good")]);
    let mut builder = Orchestrator::builder();
    builder.create_agent(alpha).unwrap();
    builder.create_agent(beta).unwrap();
    let mut orchestrator = builder.build("alpha").unwrap();

    let summary = orchestrator
        .handle_message(Invocation::user("review"))
        .collect()
        .await
        .unwrap();

    match &summary.events[0] {
        IntermediateEvent::AgentToAgentHandoff {
            response_attributes,
            ..
        } => assert_eq!(response_attributes, &attributes),
        other => panic!("expected a handoff, got {:?}", other),
    }
    let delivered = beta_probe.invocations();
    assert_eq!(delivered[0].message().unwrap().shared_files(), files.to_vec());
    assert_eq!(summary.result.shared_files(), files.to_vec());
}

#[tokio::test]
async fn test_self_delegation() {
    let (alpha, alpha_probe) = scripted(
        "alpha",
        vec![delegate("alpha", "think again"), reply("thought"), reply("final")],
    );
    let mut builder = Orchestrator::builder();
    builder.create_agent(alpha).unwrap();
    let mut orchestrator = builder.build("alpha").unwrap();

    let summary = orchestrator
        .handle_message(Invocation::user("ponder"))
        .collect()
        .await
        .unwrap();

    assert_eq!(summary.events, vec![handoff("alpha", "alpha", "think again")]);
    assert_eq!(final_text(&summary.result), "final");
    assert_eq!(alpha_probe.received(), vec!["ponder", "think again", "thought"]);
}

#[tokio::test]
async fn test_reset_clears_state_and_resets_each_agent_once() {
    let (alpha, alpha_probe) = scripted("alpha", vec![delegate("beta", "q")]);
    let (beta, beta_probe) = scripted("beta", vec![delegate("gamma", "q2")]);
    let (gamma, gamma_probe) = scripted(
        "gamma",
        vec![Turn::Finish(
            Vec::new(),
            AgentOutcome::tool_request("tool?", vec![ToolCall::new("rm", json!({"path": "x"}))]),
        )],
    );
    let mut builder = Orchestrator::builder();
    builder.create_agent(alpha).unwrap();
    builder.create_agent(beta).unwrap();
    builder.create_agent(gamma).unwrap();
    let mut orchestrator = builder.build("alpha").unwrap();

    orchestrator
        .handle_message(Invocation::user("go"))
        .finish()
        .await
        .unwrap();
    assert_eq!(orchestrator.delegation_depth(), 2);

    orchestrator.reset().await.unwrap();

    assert_eq!(orchestrator.delegation_depth(), 0);
    assert_eq!(orchestrator.active_agent(), "alpha");
    assert!(!orchestrator.has_pending_message());
    assert_eq!(orchestrator.agents().len(), 3);
    for probe in [&alpha_probe, &beta_probe, &gamma_probe] {
        assert_eq!(probe.resets(), 1);
    }
}

#[tokio::test]
async fn test_reset_continues_past_a_failing_agent() {
    let (alpha, alpha_probe) = scripted("alpha", vec![delegate("beta", "q")]);
    let (mut beta, beta_probe) = scripted("beta", vec![delegate("gamma", "q2")]);
    beta.reset_fails = true;
    let (gamma, gamma_probe) = scripted("gamma", Vec::new());
    let mut builder = Orchestrator::builder();
    builder.create_agent(alpha).unwrap();
    builder.create_agent(beta).unwrap();
    builder.create_agent(gamma).unwrap();
    let mut orchestrator = builder.build("alpha").unwrap();

    let result = orchestrator.reset().await;

    assert!(matches!(
        result,
        Err(OrchestratorError::Agent(AgentError::Configuration(message))) if message == "beta cannot forget"
    ));
    for probe in [&alpha_probe, &beta_probe, &gamma_probe] {
        assert_eq!(probe.resets(), 1);
    }
    assert_eq!(orchestrator.active_agent(), "alpha");
    assert_eq!(orchestrator.delegation_depth(), 0);
}

#[tokio::test]
async fn test_whitelist_refusal() {
    let (alpha, alpha_probe) = scripted("alpha", vec![delegate("gamma", "psst"), reply("ok then")]);
    let (beta, _) = scripted("beta", Vec::new());
    let (gamma, gamma_probe) = scripted("gamma", Vec::new());
    let mut builder = Orchestrator::builder();
    builder
        .create_agent_with(alpha, Communication::only(["beta"]))
        .unwrap();
    builder.create_agent(beta).unwrap();
    builder.create_agent(gamma).unwrap();
    let mut orchestrator = builder.build("alpha").unwrap();

    let names: Vec<String> = orchestrator
        .reachable_agents("alpha")
        .into_iter()
        .map(|info| info.name)
        .collect();
    assert_eq!(names, vec!["beta"]);

    let summary = orchestrator
        .handle_message(Invocation::user("ask gamma"))
        .collect()
        .await
        .unwrap();

    assert!(summary.events.is_empty());
    assert_eq!(final_text(&summary.result), "ok then");
    assert_eq!(
        alpha_probe.received()[1],
        "Agent alpha is not allowed to talk to agent gamma."
    );
    assert!(gamma_probe.invocations().is_empty());
}

#[tokio::test]
async fn test_depth_limit_refusal() {
    let (alpha, alpha_probe) = scripted("alpha", vec![delegate("beta", "q"), reply("partial answer")]);
    let (beta, beta_probe) = scripted("beta", vec![delegate("gamma", "q2"), reply("partial")]);
    let (gamma, gamma_probe) = scripted("gamma", Vec::new());
    let mut builder = Orchestrator::builder()
        .with_config(OrchestratorConfig::new().with_max_delegation_depth(1));
    builder.create_agent(alpha).unwrap();
    builder.create_agent(beta).unwrap();
    builder.create_agent(gamma).unwrap();
    let mut orchestrator = builder.build("alpha").unwrap();

    let summary = orchestrator
        .handle_message(Invocation::user("dig deep"))
        .collect()
        .await
        .unwrap();

    assert_eq!(summary.events, vec![handoff("alpha", "beta", "q")]);
    assert_eq!(final_text(&summary.result), "partial answer");
    assert_eq!(
        beta_probe.received(),
        vec![
            "q",
            "Maximum delegation depth of 1 reached. Agent gamma cannot be contacted; reply with what you have."
        ]
    );
    assert_eq!(alpha_probe.received(), vec!["dig deep", "partial"]);
    assert!(gamma_probe.invocations().is_empty());
}

#[tokio::test]
async fn test_turn_without_outcome_is_malformed() {
    let (alpha, _) = scripted("alpha", vec![Turn::NoOutcome]);
    let mut builder = Orchestrator::builder();
    builder.create_agent(alpha).unwrap();
    let mut orchestrator = builder.build("alpha").unwrap();

    let result = orchestrator
        .handle_message(Invocation::user("hello"))
        .finish()
        .await;

    assert!(matches!(
        result,
        Err(OrchestratorError::MalformedOutput { agent }) if agent == "alpha"
    ));
}

#[tokio::test]
async fn test_agent_failure_is_propagated() {
    let (alpha, _) = scripted("alpha", vec![Turn::Fail("model unavailable")]);
    let mut builder = Orchestrator::builder();
    builder.create_agent(alpha).unwrap();
    let mut orchestrator = builder.build("alpha").unwrap();

    let result = orchestrator
        .handle_message(Invocation::user("hello"))
        .finish()
        .await;

    assert!(matches!(
        result,
        Err(OrchestratorError::Agent(AgentError::ModelInvocation(message))) if message == "model unavailable"
    ));
}

#[tokio::test]
async fn test_interrupted_run_resumes() {
    let (alpha, alpha_probe) = scripted("alpha", vec![delegate("beta", "question"), reply("answer")]);
    let (beta, beta_probe) = scripted("beta", vec![reply("answer")]);
    let mut builder = Orchestrator::builder();
    builder.create_agent(alpha).unwrap();
    builder.create_agent(beta).unwrap();
    let mut orchestrator = builder.build("alpha").unwrap();

    {
        let mut run = orchestrator.handle_message(Invocation::user("ask beta"));
        let step = run.next_step().await.unwrap().unwrap();
        assert_eq!(step, Step::Event(handoff("alpha", "beta", "question")));
    }

    // the handoff was committed before the stream was dropped
    assert_eq!(orchestrator.active_agent(), "beta");
    assert_eq!(orchestrator.delegation_chain(), vec!["alpha"]);
    assert!(orchestrator.has_pending_message());
    assert!(beta_probe.invocations().is_empty());

    let refused = orchestrator
        .handle_message(Invocation::user("are you there?"))
        .finish()
        .await;
    assert!(matches!(
        refused,
        Err(OrchestratorError::PendingMessageOutstanding { agent }) if agent == "beta"
    ));

    let result = orchestrator.resume().finish().await.unwrap();
    assert_eq!(final_text(&result), "answer");
    assert_eq!(beta_probe.received(), vec!["question"]);
    assert_eq!(alpha_probe.received(), vec!["ask beta", "answer"]);
    assert!(!orchestrator.has_pending_message());
}

#[tokio::test]
async fn test_construction_failures() {
    let mut builder = Orchestrator::builder();
    let (first, _) = scripted("alpha", Vec::new());
    let (second, _) = scripted("alpha", Vec::new());
    builder.create_agent(first).unwrap();
    assert!(matches!(
        builder.create_agent(second),
        Err(OrchestratorError::DuplicateAgentName(name)) if name == "alpha"
    ));
    assert!(matches!(
        builder.build("beta"),
        Err(OrchestratorError::UnknownInitialAgent(name)) if name == "beta"
    ));
    assert!(matches!(
        Orchestrator::builder().build("alpha"),
        Err(OrchestratorError::NoAgents)
    ));
}
