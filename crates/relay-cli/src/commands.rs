//! Command execution.

use std::io::Write;

use relay_orchestrator::Orchestrator;
use tokio::runtime::Runtime;
use tracing::info;

use crate::chat::{self, ChatSession};
use crate::cli::{Cli, Commands};
use crate::config::RelayConfig;
use crate::error::Result;

/// Executes a command against the agents file named on the command line.
pub fn execute(cli: &Cli) -> Result<()> {
    let path = cli.config_path();
    let config = RelayConfig::load(&path)?;
    let orchestrator = config.build_orchestrator()?;
    info!(config = %path.display(), main_agent = %orchestrator.initial_agent(), "agents loaded");

    match &cli.command {
        None | Some(Commands::Chat) => {
            let continuous = cli.continuous || config.continuous_mode;
            ChatSession::new(orchestrator, continuous)?.run()
        }
        Some(Commands::Agents) => {
            print!("{}", chat::render_agents(&orchestrator));
            Ok(())
        }
        Some(Commands::Send { message }) => {
            let runtime = Runtime::new()?;
            let mut orchestrator = orchestrator;
            let mut stdout = std::io::stdout();
            runtime.block_on(send(&mut orchestrator, message, &mut stdout))
        }
    }
}

/// Send one message and write everything that happens to `out`.
///
/// Tool requests are approved automatically.
pub async fn send<W: Write>(orchestrator: &mut Orchestrator, message: &str, out: &mut W) -> Result<()> {
    let result = chat::drive_approving(orchestrator, chat::user_invocation(message), out).await?;
    writeln!(out, "{}", chat::render_result(&result))?;
    Ok(())
}
