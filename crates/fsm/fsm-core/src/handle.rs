//! Per-conversation state handle.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::record::DataMap;
use crate::storage::FsmStorage;
use crate::validation::{into_data_map, validate_key, validate_state};

/// Convenience wrapper bound to one key of one backend.
///
/// Operations issued through the same handle are serialized by a handle-local lock, which also
/// guards the cached state name. Separately created handles for the same key are not coordinated
/// here; they rely on the backend's own atomicity.
pub struct StateHandle {
    storage: Arc<dyn FsmStorage>,
    key: String,
    state: Mutex<Option<String>>,
}

impl StateHandle {
    /// Handle with a known current state; no storage round-trip.
    pub fn new(storage: Arc<dyn FsmStorage>, key: impl Into<String>, state: Option<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            state: Mutex::new(state),
        }
    }

    /// Loads the live record for `key` or creates it with `default_state` and `ttl`.
    pub async fn get_or_create(
        storage: Arc<dyn FsmStorage>,
        key: impl Into<String>,
        default_state: Option<&str>,
        ttl: Option<Duration>,
    ) -> Result<Self> {
        let key = key.into();
        validate_key(&key)?;
        let state = storage.get_or_create_state(&key, default_state, ttl).await?;
        debug!(key = %key, state = ?state, backend = storage.backend_name(), "state handle opened");
        Ok(Self::new(storage, key, state))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Last state this handle saw or wrote; `None` means no state.
    pub async fn state(&self) -> Option<String> {
        self.state.lock().await.clone()
    }

    pub async fn set_state(&self, state: &str) -> Result<()> {
        validate_state(state)?;
        let mut current = self.state.lock().await;
        self.storage.set_state(state, &self.key, None).await?;
        *current = Some(state.to_string());
        Ok(())
    }

    /// Replaces the stored data; `data` must serialize to a JSON object.
    pub async fn set_data<T: Serialize>(&self, data: T) -> Result<()> {
        let data = into_data_map(data)?;
        let _guard = self.state.lock().await;
        self.storage.set_data(data, &self.key, None).await
    }

    pub async fn get_data(&self) -> Result<DataMap> {
        let _guard = self.state.lock().await;
        self.storage.get_data(&self.key).await
    }

    /// Deletes the record and resets the cached state.
    pub async fn finish(&self) -> Result<()> {
        let mut current = self.state.lock().await;
        self.storage.finish_state(&self.key).await?;
        *current = None;
        Ok(())
    }
}

impl fmt::Debug for StateHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateHandle")
            .field("key", &self.key)
            .field("backend", &self.storage.backend_name())
            .finish()
    }
}
