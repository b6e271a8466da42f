//! Interactive chat with the main agent.
//!
//! Lines are sent to the engine as user messages; slash commands control
//! the session. Leading `(path)` groups attach files:
//!
//! ```text
//! you> (~/notes.md) (./todo.txt) summarize these
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use relay_orchestrator::{
    AgentMessage, EngineResult, IntermediateEvent, Invocation, MessageContent, Orchestrator,
    SharedFile, Step, ToolPermissionRequest,
};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::runtime::Runtime;
use tracing::{debug, warn};

use crate::config;
use crate::error::Result;

/// Prompt shown when an agent asks to run tools.
pub const APPROVAL_PROMPT: &str =
    "Should AI continue? Type Y or press Enter to continue, otherwise type a message to the AI: ";

/// Shown when a new message answers a tool request left by an interrupted run.
pub const NOT_APPROVED: &str = "(tool request not approved; your message was sent instead)";

/// Longest tool output shown in full.
pub const MAX_TOOL_OUTPUT: usize = 3000;

const PROMPT: &str = "you> ";

const HELP: &str = "\
Commands:
  /reset    Reset every agent and start over
  /agents   List agents and whom they may delegate to
  /help     Show this help
  /quit     Exit

Start a message with (path) groups to attach files, e.g. (notes.md) summarize";

/// A parsed chat line.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Reset all agents
    Reset,
    /// List agents
    Agents,
    /// Show help
    Help,
    /// Leave the chat
    Quit,
    /// Unknown slash command
    Unknown(String),
    /// A message for the agents
    Message(String),
    /// Blank line
    Empty,
}

impl ChatCommand {
    /// Parses a chat line.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.is_empty() {
            return ChatCommand::Empty;
        }

        match input.strip_prefix('/') {
            Some(command) => match command.to_lowercase().as_str() {
                "reset" => ChatCommand::Reset,
                "agents" => ChatCommand::Agents,
                "help" | "h" | "?" => ChatCommand::Help,
                "quit" | "q" | "exit" => ChatCommand::Quit,
                other => ChatCommand::Unknown(other.to_string()),
            },
            None => ChatCommand::Message(input.to_string()),
        }
    }
}

static ATTACHMENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\(([^)]+)\)\s*").expect("Invalid attachment regex"));

/// Split leading `(path)` groups off a line.
///
/// Returns the attached files and the remaining text.
pub fn parse_attachments(line: &str) -> (Vec<SharedFile>, String) {
    let mut files = Vec::new();
    let mut rest = line;

    while let Some(captures) = ATTACHMENT_REGEX.captures(rest) {
        let raw = captures[1].trim();
        let path = PathBuf::from(shellexpand::tilde(raw).to_string());
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| raw.to_string());
        files.push(SharedFile::new(file_name, path.display().to_string()));
        rest = &rest[captures[0].len()..];
    }

    (files, rest.trim().to_string())
}

/// Turn a chat line into a user invocation with its attachments.
pub fn user_invocation(line: &str) -> Invocation {
    let (files, text) = parse_attachments(line);
    let mut message = AgentMessage::new(text);
    if !files.is_empty() {
        debug!(files = files.len(), "attaching files");
        message = message.with_shared_files(&files);
    }
    Invocation::user_message(message)
}

/// Map the answer to the approval prompt to the next invocation.
pub fn approval(answer: &str) -> Invocation {
    let answer = answer.trim();
    if answer.is_empty() || answer.eq_ignore_ascii_case("y") {
        Invocation::Continue
    } else {
        user_invocation(answer)
    }
}

/// Shorten `text` to `max` characters.
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}... (truncated)", &text[..cut]),
        None => text.to_string(),
    }
}

fn render_files(files: &[SharedFile]) -> String {
    let mut out = String::new();
    for file in files {
        out.push_str(&format!("\n  - {} ({})", file.file_name, file.url));
    }
    out
}

fn render_content(content: &MessageContent) -> String {
    content.to_text()
}

/// Render a live event.
pub fn render_event(event: &IntermediateEvent) -> String {
    match event {
        IntermediateEvent::ToolInvocationObserved {
            agent_name,
            tool_name,
            input,
            output,
        } => format!(
            "Agent `{}` called tool `{}`\n  input: {}\n  output: {}",
            agent_name,
            tool_name,
            input,
            truncate(output, MAX_TOOL_OUTPUT)
        ),
        IntermediateEvent::AgentToAgentHandoff {
            source_agent,
            destination_agent,
            content,
            response_attributes,
        } => {
            let files = AgentMessage::new(content.clone())
                .with_attributes(response_attributes.clone())
                .shared_files();
            format!(
                "{} → {}: {}{}",
                source_agent,
                destination_agent,
                render_content(content),
                render_files(&files)
            )
        }
    }
}

/// Render a tool permission request.
pub fn render_request(request: &ToolPermissionRequest) -> String {
    let mut out = format!("Agent `{}` wants to run tools:", request.calling_agent);
    for call in &request.tool_calls {
        out.push_str(&format!("\n  - {}", call));
    }
    if !request.content.is_empty() {
        out.push_str(&format!("\n{}", render_content(&request.content)));
    }
    out
}

/// Render the end of a run.
pub fn render_result(result: &EngineResult) -> String {
    match result {
        EngineResult::FinalReply { content, .. } => {
            let files = result.shared_files();
            if files.is_empty() {
                render_content(content)
            } else {
                format!("{}\nShared files:{}", render_content(content), render_files(&files))
            }
        }
        EngineResult::ToolPermissionRequest(request) => render_request(request),
    }
}

/// Run one invocation, writing events to `out` as they arrive.
///
/// A run left behind by an earlier interruption is finished first. If it
/// stops at a tool request, `invocation` is the answer to that request:
/// [`Invocation::Continue`] approves it and anything else declines it.
pub async fn drive<W: Write>(
    orchestrator: &mut Orchestrator,
    invocation: Invocation,
    out: &mut W,
) -> Result<EngineResult> {
    if orchestrator.has_pending_message() {
        warn!(agent = %orchestrator.active_agent(), "finishing interrupted run");
        let leftover = run_stream(orchestrator, None, out).await?;
        writeln!(out, "{}", render_result(&leftover))?;
        if leftover.is_tool_request() && !invocation.is_continue() {
            writeln!(out, "{}", NOT_APPROVED)?;
        }
    }
    run_stream(orchestrator, Some(invocation), out).await
}

async fn run_stream<W: Write>(
    orchestrator: &mut Orchestrator,
    invocation: Option<Invocation>,
    out: &mut W,
) -> Result<EngineResult> {
    let mut stream = match invocation {
        Some(invocation) => orchestrator.handle_message(invocation),
        None => orchestrator.resume(),
    };
    while let Some(step) = stream.next_step().await {
        match step? {
            Step::Event(event) => writeln!(out, "{}", render_event(&event))?,
            Step::Finished(result) => return Ok(result),
        }
    }
    Err(relay_orchestrator::OrchestratorError::StreamExhausted.into())
}

/// Run until a final reply, approving every tool request.
pub async fn drive_approving<W: Write>(
    orchestrator: &mut Orchestrator,
    invocation: Invocation,
    out: &mut W,
) -> Result<EngineResult> {
    let mut result = drive(orchestrator, invocation, out).await?;
    while let EngineResult::ToolPermissionRequest(request) = &result {
        writeln!(out, "{}", render_request(request))?;
        writeln!(out, "(approved)")?;
        result = drive(orchestrator, Invocation::Continue, out).await?;
    }
    Ok(result)
}

/// Render the agent list.
pub fn render_agents(orchestrator: &Orchestrator) -> String {
    let mut out = String::new();
    for info in orchestrator.agents() {
        let marker = if info.name == orchestrator.initial_agent() {
            " (main)"
        } else {
            ""
        };
        out.push_str(&format!("{}{} - {}\n", info.name, marker, info.description));

        let reachable: Vec<String> = orchestrator
            .reachable_agents(&info.name)
            .into_iter()
            .map(|peer| peer.name)
            .collect();
        if reachable.is_empty() {
            out.push_str("    talks to: nobody\n");
        } else {
            out.push_str(&format!("    talks to: {}\n", reachable.join(", ")));
        }
    }
    out
}

/// Interactive chat session.
pub struct ChatSession {
    editor: DefaultEditor,
    orchestrator: Orchestrator,
    runtime: Runtime,
    continuous: bool,
    history_path: PathBuf,
}

impl ChatSession {
    /// Creates a chat session around an engine.
    pub fn new(orchestrator: Orchestrator, continuous: bool) -> Result<Self> {
        let config = rustyline::Config::builder().auto_add_history(false).build();
        let mut editor = DefaultEditor::with_config(config)?;
        let runtime = Runtime::new()?;

        let history_path = config::default_dir().join("history.txt");
        if history_path.exists() {
            let _ = editor.load_history(&history_path);
        }

        Ok(Self {
            editor,
            orchestrator,
            runtime,
            continuous,
            history_path,
        })
    }

    /// Runs the chat loop until `/quit` or end of input.
    pub fn run(&mut self) -> Result<()> {
        println!("Relay v{}", env!("CARGO_PKG_VERSION"));
        println!(
            "Talking to {}. Type /help for commands, /quit to exit",
            self.orchestrator.initial_agent()
        );
        if self.continuous {
            println!("Continuous mode: tool requests are approved automatically");
        }
        println!();

        loop {
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    self.editor.add_history_entry(line.as_str())?;

                    let command = ChatCommand::parse(&line);
                    debug!(?command, "Parsed command");

                    match self.handle_command(command) {
                        Ok(true) => break,
                        Ok(false) => {}
                        Err(e) => eprintln!("Error: {}", e),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                }
                Err(ReadlineError::Eof) => {
                    println!("^D");
                    break;
                }
                Err(err) => {
                    eprintln!("Error: {:?}", err);
                    break;
                }
            }
        }

        save_history(&mut self.editor, &self.history_path);

        println!("Goodbye!");
        Ok(())
    }

    /// Handles a chat command. Returns Ok(true) if should quit.
    fn handle_command(&mut self, command: ChatCommand) -> Result<bool> {
        match command {
            ChatCommand::Quit => return Ok(true),
            ChatCommand::Reset => {
                self.runtime.block_on(self.orchestrator.reset())?;
                println!("All agents reset.");
            }
            ChatCommand::Agents => print!("{}", render_agents(&self.orchestrator)),
            ChatCommand::Help => println!("{}", HELP),
            ChatCommand::Unknown(name) => {
                println!("Unknown command: /{} (type /help)", name)
            }
            ChatCommand::Empty => {}
            ChatCommand::Message(text) => self.converse(user_invocation(&text))?,
        }
        Ok(false)
    }

    /// Send a message and keep going through tool approvals.
    fn converse(&mut self, invocation: Invocation) -> Result<()> {
        let mut next = Some(invocation);
        while let Some(invocation) = next.take() {
            let mut stdout = std::io::stdout();
            let result = self
                .runtime
                .block_on(drive(&mut self.orchestrator, invocation, &mut stdout))?;

            match &result {
                EngineResult::FinalReply { .. } => println!("{}", render_result(&result)),
                EngineResult::ToolPermissionRequest(request) => {
                    println!("{}", render_request(request));
                    if self.continuous {
                        next = Some(Invocation::Continue);
                        continue;
                    }
                    match self.editor.readline(APPROVAL_PROMPT) {
                        Ok(answer) => next = Some(approval(&answer)),
                        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                            println!("Tool request left unanswered.");
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
            }
        }
        Ok(())
    }
}

fn save_history(editor: &mut DefaultEditor, path: &Path) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = editor.save_history(path) {
        debug!(error = %e, "failed to save history");
    }
}
