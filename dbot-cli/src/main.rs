//! dbot-fsm CLI: list, inspect, finish and expire conversation states in the configured backend.
//! Backend and options come from env (`FSM_*`, see `dbot_fsm::FsmConfig`).

use anyhow::{Context, Result};
use clap::Parser;
use dbot_cli::{load_config, run_command, Cli};
use dbot_core::init_tracing;
use dbot_fsm::build_storage;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = load_config().context("Load FSM config from env (FSM_STORAGE, FSM_* ...)")?;
    init_tracing(Some(config.log_file.as_str()))?;

    let storage = build_storage(&config)
        .await
        .with_context(|| format!("Connect to {} storage", config.backend))?;

    let mut stdout = std::io::stdout();
    run_command(cli.command, storage, &mut stdout).await
}
