//! FSM context bound to the conversation of one update.

use dbot_core::{Result, Update};
use fsm_core::{into_data_map, ConversationKey, DataMap, FsmStorage, StateHandle};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Pass-through to the storage contract, keyed by the conversation of an update.
///
/// Absence is soft on the read side: `get_state` gives `None`, `get_data` and `get_state_data`
/// give empty data. `update_data` merges on the client, so concurrent merges on one key are
/// last-writer-wins.
#[derive(Clone)]
pub struct FsmContext {
    storage: Arc<dyn FsmStorage>,
    key: ConversationKey,
}

impl FsmContext {
    pub fn new(storage: Arc<dyn FsmStorage>, key: ConversationKey) -> Self {
        Self { storage, key }
    }

    /// Derives the key `client-user-chat` from the update's identity; missing ids become
    /// `unknown`.
    pub fn for_update(storage: Arc<dyn FsmStorage>, client_id: i64, update: &Update) -> Self {
        let identity = update.identity();
        let key = ConversationKey::from_parts(client_id, identity.user_id, identity.chat_id);
        debug!(key = %key, kind = update.kind(), "fsm context for update");
        Self::new(storage, key)
    }

    pub fn key(&self) -> &str {
        self.key.as_str()
    }

    pub fn storage(&self) -> &Arc<dyn FsmStorage> {
        &self.storage
    }

    #[instrument(skip(self), fields(key = %self.key))]
    pub async fn get_state(&self) -> Result<Option<String>> {
        match self.storage.get_state_data(self.key()).await {
            Ok(record) => Ok(record.state),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Moves the conversation to `state`; `None` finishes it.
    #[instrument(skip(self), fields(key = %self.key))]
    pub async fn set_state(&self, state: Option<&str>) -> Result<()> {
        match state {
            Some(state) => Ok(self.storage.set_state(state, self.key(), None).await?),
            None => self.finish().await,
        }
    }

    #[instrument(skip(self), fields(key = %self.key))]
    pub async fn get_data(&self) -> Result<DataMap> {
        Ok(self.storage.get_data(self.key()).await?)
    }

    /// Replaces the data, creating a stateless record first when none exists.
    #[instrument(skip(self, data), fields(key = %self.key))]
    pub async fn set_data<T: Serialize>(&self, data: T) -> Result<()> {
        let data = into_data_map(data)?;
        self.storage
            .get_or_create_state(self.key(), None, None)
            .await?;
        Ok(self.storage.set_data(data, self.key(), None).await?)
    }

    /// Shallow-merges `patch` into the current data and returns the merged mapping.
    #[instrument(skip(self, patch), fields(key = %self.key))]
    pub async fn update_data<T: Serialize>(&self, patch: T) -> Result<DataMap> {
        let patch = into_data_map(patch)?;
        self.storage
            .get_or_create_state(self.key(), None, None)
            .await?;
        let mut data = self.storage.get_data(self.key()).await?;
        data.extend(patch);
        self.storage
            .set_data(data.clone(), self.key(), None)
            .await?;
        Ok(data)
    }

    /// Deletes state and data; finishing an absent conversation succeeds.
    #[instrument(skip(self), fields(key = %self.key))]
    pub async fn finish(&self) -> Result<()> {
        Ok(self.storage.finish_state(self.key()).await?)
    }

    #[instrument(skip(self), fields(key = %self.key))]
    pub async fn get_state_data(&self) -> Result<(Option<String>, DataMap)> {
        match self.storage.get_state_data(self.key()).await {
            Ok(record) => Ok((record.state, record.data)),
            Err(e) if e.is_not_found() => Ok((None, DataMap::new())),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes state and data in one backend operation; `None` finishes the conversation.
    #[instrument(skip(self, data), fields(key = %self.key))]
    pub async fn set_state_data<T: Serialize>(&self, state: Option<&str>, data: T) -> Result<()> {
        let Some(state) = state else {
            return self.finish().await;
        };
        let data = into_data_map(data)?;
        Ok(self
            .storage
            .set_state_data(self.key(), state, data, None)
            .await?)
    }

    /// Handle over the same key, creating a stateless record when none exists.
    pub async fn state_handle(&self) -> Result<StateHandle> {
        Ok(StateHandle::get_or_create(self.storage.clone(), self.key(), None, None).await?)
    }
}

impl std::fmt::Debug for FsmContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsmContext")
            .field("key", &self.key)
            .field("backend", &self.storage.backend_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbot_core::{CallbackQuery, Chat, Message, User};
    use fsm_memory::MemoryStorage;
    use serde_json::json;

    fn message(chat_id: i64, user_id: Option<i64>) -> Update {
        Update::Message(Message {
            id: 1,
            chat: Chat {
                id: chat_id,
                chat_type: "private".to_string(),
            },
            from: user_id.map(User::with_id),
            text: Some("hi".to_string()),
            date: chrono::Utc::now(),
        })
    }

    fn context(update: &Update) -> FsmContext {
        FsmContext::for_update(Arc::new(MemoryStorage::new()), 1, update)
    }

    #[test]
    fn test_key_from_message() {
        assert_eq!(context(&message(3, Some(2))).key(), "1-2-3");
        assert_eq!(context(&message(3, None)).key(), "1-unknown-3");
    }

    #[test]
    fn test_key_from_callback_without_message() {
        let update = Update::CallbackQuery(CallbackQuery {
            id: "q".to_string(),
            from: User::with_id(2),
            message: None,
            data: None,
        });
        assert_eq!(context(&update).key(), "1-2-unknown");
    }

    #[tokio::test]
    async fn test_absent_conversation_reads_softly() {
        let ctx = context(&message(3, Some(2)));
        assert_eq!(ctx.get_state().await.unwrap(), None);
        assert!(ctx.get_data().await.unwrap().is_empty());
        assert_eq!(ctx.get_state_data().await.unwrap(), (None, DataMap::new()));
        ctx.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_set_state_none_finishes() {
        let ctx = context(&message(3, Some(2)));
        ctx.set_state(Some("a")).await.unwrap();
        ctx.set_data(json!({"x": 1})).await.unwrap();
        ctx.set_state(None).await.unwrap();
        assert_eq!(ctx.get_state_data().await.unwrap(), (None, DataMap::new()));
    }

    #[tokio::test]
    async fn test_non_mapping_data_is_rejected() {
        let ctx = context(&message(3, Some(2)));
        let err = ctx.set_data(json!([1, 2])).await.unwrap_err();
        assert!(matches!(err, dbot_core::DbotError::Storage(ref e) if e.is_validation()));
    }
}
