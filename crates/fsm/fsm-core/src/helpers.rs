//! Operations derived from the [`FsmStorage`] primitives.
//!
//! Free functions so backends only implement the minimal contract.

use futures::TryStreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::storage::{FsmStorage, StateFilter};

/// Whether a live record exists for `key`; absence is `false`, other errors propagate.
pub async fn state_exists(storage: &dyn FsmStorage, key: &str) -> Result<bool> {
    match storage.get_state_data(key).await {
        Ok(_) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Re-applies the current state of `key` with a new TTL (the backend's default when `None`).
///
/// A missing record propagates `StateNotFound`. With neither a TTL nor a default this is a no-op.
/// A record without a state is refreshed through `set_data` with its current data, since the
/// "no state" sentinel is not a valid `set_state` argument.
pub async fn update_ttl(storage: &dyn FsmStorage, key: &str, ttl: Option<Duration>) -> Result<()> {
    let record = storage.get_state_data(key).await?;
    let Some(ttl) = ttl.or(storage.options().default_ttl) else {
        debug!(key = %key, "update_ttl: no ttl and no default, nothing to do");
        return Ok(());
    };
    match record.state.as_deref() {
        Some(state) => storage.set_state(state, key, Some(ttl)).await,
        None => storage.set_data(record.data, key, Some(ttl)).await,
    }
}

/// Drains [`FsmStorage::list_states`] into a vector.
pub async fn collect_states(storage: &dyn FsmStorage, filter: StateFilter) -> Result<Vec<String>> {
    storage.list_states(filter).await?.try_collect().await
}

/// Runs `cleanup_expired` every `interval` until `cancel` fires.
///
/// Sweep failures are logged and the loop keeps going.
pub fn spawn_expiry_sweeper(
    storage: Arc<dyn FsmStorage>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match storage.cleanup_expired().await {
                        Ok(0) => {}
                        Ok(removed) => info!(
                            backend = storage.backend_name(),
                            removed,
                            "expiry sweep removed records"
                        ),
                        Err(e) => warn!(
                            backend = storage.backend_name(),
                            error = %e,
                            "expiry sweep failed"
                        ),
                    }
                }
                _ = cancel.cancelled() => {
                    info!(backend = storage.backend_name(), "expiry sweeper shutting down");
                    break;
                }
            }
        }
    })
}
