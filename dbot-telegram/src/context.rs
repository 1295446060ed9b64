//! Loading the FSM update context straight from a teloxide update.

use dbot_core::{Result, ToCoreUpdate};
use dbot_fsm::UpdateContext;
use fsm_core::FsmStorage;
use std::sync::Arc;
use tracing::debug;

use crate::adapters::TelegramUpdateWrapper;

/// Converts `update` and loads its [`UpdateContext`]; `Ok(None)` for update kinds the FSM layer
/// does not handle. `bot_id` scopes the conversation key to one bot.
pub async fn load_update_context(
    storage: Arc<dyn FsmStorage>,
    bot_id: i64,
    update: &teloxide::types::Update,
) -> Result<Option<UpdateContext>> {
    let Some(core) = TelegramUpdateWrapper(update).to_core() else {
        debug!(update_id = update.id.0, "update kind not handled by fsm");
        return Ok(None);
    };
    UpdateContext::load(storage, bot_id, core).await.map(Some)
}
