//! Core types: user, chat, the update kinds the FSM layer sees, and identity resolution.
//!
//! Transport adapters (see `dbot-telegram`) build an [`Update`] once per incoming event; everything
//! downstream only asks it for an [`Identity`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User identity (id, username, names).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl User {
    /// User with only an id; names unknown.
    pub fn with_id(id: i64) -> Self {
        Self {
            id,
            username: None,
            first_name: None,
            last_name: None,
        }
    }
}

/// Chat (channel, group or private) identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub chat_type: String,
}

/// A message. `from` is absent for channel posts and some service messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i32,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
    pub date: DateTime<Utc>,
}

/// Inline keyboard button press. `message` is absent for inline-mode messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

/// Inline query typed in any chat; carries no chat identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineQuery {
    pub id: String,
    pub from: User,
    pub query: String,
}

/// Request to join a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatJoinRequest {
    pub chat: Chat,
    pub from: User,
    pub date: DateTime<Utc>,
}

/// Membership change of a user in a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMemberUpdated {
    pub chat: Chat,
    pub from: User,
    pub date: DateTime<Utc>,
}

/// Chat/user identity of an update; either side may be unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Identity {
    pub chat_id: Option<i64>,
    pub user_id: Option<i64>,
}

/// The update kinds the bot layer dispatches on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Update {
    Message(Message),
    EditedMessage(Message),
    CallbackQuery(CallbackQuery),
    InlineQuery(InlineQuery),
    ChatJoinRequest(ChatJoinRequest),
    ChatMemberUpdated(ChatMemberUpdated),
}

impl Update {
    /// Resolves chat and user ids.
    ///
    /// The update's own sender/chat win; a callback query falls back to the chat (and sender) of
    /// the message it is attached to.
    pub fn identity(&self) -> Identity {
        match self {
            Update::Message(m) | Update::EditedMessage(m) => Identity {
                chat_id: Some(m.chat.id),
                user_id: m.from.as_ref().map(|u| u.id),
            },
            Update::CallbackQuery(q) => Identity {
                chat_id: q.message.as_ref().map(|m| m.chat.id),
                user_id: Some(q.from.id),
            },
            Update::InlineQuery(q) => Identity {
                chat_id: None,
                user_id: Some(q.from.id),
            },
            Update::ChatJoinRequest(r) => Identity {
                chat_id: Some(r.chat.id),
                user_id: Some(r.from.id),
            },
            Update::ChatMemberUpdated(u) => Identity {
                chat_id: Some(u.chat.id),
                user_id: Some(u.from.id),
            },
        }
    }

    /// Short name of the update kind, used as a tracing field.
    pub fn kind(&self) -> &'static str {
        match self {
            Update::Message(_) => "message",
            Update::EditedMessage(_) => "edited_message",
            Update::CallbackQuery(_) => "callback_query",
            Update::InlineQuery(_) => "inline_query",
            Update::ChatJoinRequest(_) => "chat_join_request",
            Update::ChatMemberUpdated(_) => "chat_member_updated",
        }
    }
}

impl From<Message> for Update {
    fn from(message: Message) -> Self {
        Update::Message(message)
    }
}

impl From<CallbackQuery> for Update {
    fn from(query: CallbackQuery) -> Self {
        Update::CallbackQuery(query)
    }
}

/// Converts a transport-specific user type to core [`User`].
pub trait ToCoreUser: Send + Sync {
    fn to_core(&self) -> User;
}

/// Converts a transport-specific chat type to core [`Chat`].
pub trait ToCoreChat: Send + Sync {
    fn to_core(&self) -> Chat;
}

/// Converts a transport-specific message type to core [`Message`].
pub trait ToCoreMessage: Send + Sync {
    fn to_core(&self) -> Message;
}

/// Converts a transport-specific update; `None` for kinds the FSM layer does not handle.
pub trait ToCoreUpdate: Send + Sync {
    fn to_core(&self) -> Option<Update>;
}
