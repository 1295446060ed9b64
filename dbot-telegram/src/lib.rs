//! # dbot-telegram
//!
//! Telegram boundary of the FSM layer. Converts teloxide updates into [`dbot_core::Update`] once,
//! so that nothing downstream probes Telegram types for chat or sender, and loads the
//! [`dbot_fsm::UpdateContext`] for them.

mod adapters;
mod context;

pub use adapters::{
    TelegramCallbackQueryWrapper, TelegramChatWrapper, TelegramMessageWrapper,
    TelegramUpdateWrapper, TelegramUserWrapper,
};
pub use context::load_update_context;
