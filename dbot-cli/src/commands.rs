//! Command implementations. Output goes to the given writer so commands can be tested.

use anyhow::{Context, Result};
use fsm_core::{spawn_expiry_sweeper, FsmStorage, StateFilter};
use futures::TryStreamExt;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::Commands;

pub async fn run_command<W: Write>(
    command: Commands,
    storage: Arc<dyn FsmStorage>,
    out: &mut W,
) -> Result<()> {
    match command {
        Commands::List {
            state,
            created_before,
        } => {
            let filter = StateFilter {
                state,
                created_before,
            };
            let mut keys = storage.list_states(filter).await?;
            let mut count = 0usize;
            while let Some(key) = keys.try_next().await? {
                writeln!(out, "{}", key)?;
                count += 1;
            }
            info!(count, "listed states");
        }
        Commands::Get { key } => match storage.get_state_data(&key).await {
            Ok(record) => {
                let json = serde_json::to_string_pretty(&record)?;
                writeln!(out, "{}", json)?;
            }
            Err(e) if e.is_not_found() => writeln!(out, "No state for key '{}'.", key)?,
            Err(e) => return Err(e).with_context(|| format!("Read state of '{}'", key)),
        },
        Commands::Finish { key } => {
            storage.finish_state(&key).await?;
            writeln!(out, "Finished '{}'.", key)?;
        }
        Commands::Cleanup => {
            let removed = storage.cleanup_expired().await?;
            writeln!(out, "Removed {} expired record(s).", removed)?;
        }
        Commands::SetState {
            key,
            state,
            ttl_secs,
        } => {
            storage
                .set_state(&state, &key, ttl_secs.map(Duration::from_secs))
                .await
                .with_context(|| format!("Set state of '{}'", key))?;
            writeln!(out, "'{}' -> {}", key, state)?;
        }
        Commands::Sweep { interval_secs } => {
            let cancel = CancellationToken::new();
            let sweeper = spawn_expiry_sweeper(
                storage.clone(),
                Duration::from_secs(interval_secs.max(1)),
                cancel.clone(),
            );
            writeln!(out, "Sweeping every {}s; Ctrl-C to stop.", interval_secs.max(1))?;
            tokio::signal::ctrl_c().await?;
            cancel.cancel();
            sweeper.await?;
        }
    }
    Ok(())
}
