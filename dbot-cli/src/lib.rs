//! # dbot-cli
//!
//! Operator CLI over the configured FSM backend: argument parsing, config loading and the
//! command implementations.

pub mod cli;
pub mod commands;

pub use cli::{load_config, Cli, Commands};
pub use commands::run_command;
