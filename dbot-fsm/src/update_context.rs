//! Per-update context threaded through handler code.

use dbot_core::{Result, Update};
use fsm_core::FsmStorage;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::context::FsmContext;

/// Everything a handler needs about one incoming update: the update itself, the conversation
/// state resolved at load time, the [`FsmContext`], and a key-ordered data bag that
/// [`crate::Middleware`] fill for handlers further down the [`crate::UpdateChain`].
#[derive(Debug)]
pub struct UpdateContext {
    update: Update,
    fsm: FsmContext,
    state: Option<String>,
    data: BTreeMap<String, Value>,
}

impl UpdateContext {
    /// Resolves the conversation state (creating a stateless record when none exists).
    #[instrument(skip(storage, update), fields(kind = update.kind()))]
    pub async fn load(storage: Arc<dyn FsmStorage>, client_id: i64, update: Update) -> Result<Self> {
        let fsm = FsmContext::for_update(storage, client_id, &update);
        let state = fsm
            .storage()
            .get_or_create_state(fsm.key(), None, None)
            .await?;
        debug!(key = %fsm.key(), state = ?state, "update context loaded");
        Ok(Self {
            update,
            fsm,
            state,
            data: BTreeMap::new(),
        })
    }

    pub fn update(&self) -> &Update {
        &self.update
    }

    pub fn fsm(&self) -> &FsmContext {
        &self.fsm
    }

    /// State as of [`UpdateContext::load`]; writes through [`FsmContext`] do not refresh it.
    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    /// Stores `value` under `key`, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.data.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &BTreeMap<String, Value> {
        &self.data
    }
}
