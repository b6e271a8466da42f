//! Command-line interface definition using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config;

/// Relay - talk to a team of agents that delegate to each other
#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to the agents file
    #[arg(short, long, env = config::CONFIG_ENV)]
    pub config: Option<String>,

    /// Approve tool requests without asking
    #[arg(long)]
    pub continuous: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Start an interactive chat with the main agent
    Chat,

    /// List agents and whom they may delegate to
    Agents,

    /// Send one message and print the reply
    Send {
        /// Message to send; leading "(path)" groups attach files
        #[arg(required = true)]
        message: String,
    },
}

impl Cli {
    /// Returns the agents file path, using the default if not specified.
    pub fn config_path(&self) -> PathBuf {
        config::resolve_path(self.config.as_deref())
    }

    /// Returns the log level based on verbosity.
    pub fn log_level(&self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}
