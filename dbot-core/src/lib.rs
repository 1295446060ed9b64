//! # dbot-core
//!
//! Core update model for the FSM layer: [`Update`] is a tagged union of the Telegram update kinds
//! the bot reacts to, each resolving to a uniform [`Identity`] (chat id, user id) once at the
//! boundary. Also hosts the crate-spanning error type and tracing initialization.

pub mod error;
pub mod logger;
pub mod types;

pub use error::{DbotError, Result};
pub use logger::init_tracing;
pub use types::{
    CallbackQuery, Chat, ChatJoinRequest, ChatMemberUpdated, Identity, InlineQuery, Message,
    ToCoreChat, ToCoreMessage, ToCoreUpdate, ToCoreUser, Update, User,
};
