//! Relay CLI library.
//!
//! This crate provides the `relay` command-line interface: an agents file
//! loader, rule-driven scripted agents and an interactive chat REPL on top
//! of the delegation engine.

pub mod chat;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod scripted;

pub use error::{CliError, Result};
