//! Adapters from Telegram (teloxide) types to dbot_core types.
//! Depends only on teloxide and dbot_core type definitions.

use chrono::{DateTime, Utc};
use dbot_core::{
    CallbackQuery, Chat, ChatJoinRequest, ChatMemberUpdated, InlineQuery, Message, ToCoreChat,
    ToCoreMessage, ToCoreUpdate, ToCoreUser, Update, User,
};
use teloxide::types::{MaybeInaccessibleMessage, UpdateKind};

/// Wraps a teloxide User for conversion to core [`User`].
pub struct TelegramUserWrapper<'a>(pub &'a teloxide::types::User);

impl<'a> ToCoreUser for TelegramUserWrapper<'a> {
    fn to_core(&self) -> User {
        User {
            id: self.0.id.0 as i64,
            username: self.0.username.clone(),
            first_name: Some(self.0.first_name.clone()),
            last_name: self.0.last_name.clone(),
        }
    }
}

/// Wraps a teloxide Chat for conversion to core [`Chat`].
pub struct TelegramChatWrapper<'a>(pub &'a teloxide::types::Chat);

impl<'a> ToCoreChat for TelegramChatWrapper<'a> {
    fn to_core(&self) -> Chat {
        let chat = self.0;
        let chat_type = if chat.is_private() {
            "private"
        } else if chat.is_supergroup() {
            "supergroup"
        } else if chat.is_group() {
            "group"
        } else if chat.is_channel() {
            "channel"
        } else {
            "unknown"
        };
        Chat {
            id: chat.id.0,
            chat_type: chat_type.to_string(),
        }
    }
}

/// Wraps a teloxide Message for conversion to core [`Message`].
pub struct TelegramMessageWrapper<'a>(pub &'a teloxide::types::Message);

impl<'a> ToCoreMessage for TelegramMessageWrapper<'a> {
    fn to_core(&self) -> Message {
        Message {
            id: self.0.id.0,
            chat: TelegramChatWrapper(&self.0.chat).to_core(),
            from: self.0.from.as_ref().map(|u| TelegramUserWrapper(u).to_core()),
            text: self.0.text().map(str::to_string),
            date: self.0.date,
        }
    }
}

/// Wraps a teloxide CallbackQuery for conversion to core [`CallbackQuery`].
pub struct TelegramCallbackQueryWrapper<'a>(pub &'a teloxide::types::CallbackQuery);

impl<'a> TelegramCallbackQueryWrapper<'a> {
    /// An inaccessible (too old) attached message still contributes its chat, so the query
    /// resolves to the same conversation.
    pub fn to_core(&self) -> CallbackQuery {
        let message = self.0.message.as_ref().map(|attached| match attached {
            MaybeInaccessibleMessage::Regular(message) => {
                TelegramMessageWrapper(message).to_core()
            }
            MaybeInaccessibleMessage::Inaccessible(message) => Message {
                id: message.message_id.0,
                chat: TelegramChatWrapper(&message.chat).to_core(),
                from: None,
                text: None,
                date: DateTime::<Utc>::UNIX_EPOCH,
            },
        });
        CallbackQuery {
            id: self.0.id.to_string(),
            from: TelegramUserWrapper(&self.0.from).to_core(),
            message,
            data: self.0.data.clone(),
        }
    }
}

/// Wraps a teloxide Update for conversion to core [`Update`].
///
/// Channel posts are treated as messages without a sender; polls, payments and the like give
/// `None`.
pub struct TelegramUpdateWrapper<'a>(pub &'a teloxide::types::Update);

impl<'a> ToCoreUpdate for TelegramUpdateWrapper<'a> {
    fn to_core(&self) -> Option<Update> {
        let converted = match &self.0.kind {
            UpdateKind::Message(message) | UpdateKind::ChannelPost(message) => {
                Update::Message(TelegramMessageWrapper(message).to_core())
            }
            UpdateKind::EditedMessage(message) | UpdateKind::EditedChannelPost(message) => {
                Update::EditedMessage(TelegramMessageWrapper(message).to_core())
            }
            UpdateKind::CallbackQuery(query) => {
                Update::CallbackQuery(TelegramCallbackQueryWrapper(query).to_core())
            }
            UpdateKind::InlineQuery(query) => Update::InlineQuery(InlineQuery {
                id: query.id.to_string(),
                from: TelegramUserWrapper(&query.from).to_core(),
                query: query.query.clone(),
            }),
            UpdateKind::ChatJoinRequest(request) => Update::ChatJoinRequest(ChatJoinRequest {
                chat: TelegramChatWrapper(&request.chat).to_core(),
                from: TelegramUserWrapper(&request.from).to_core(),
                date: request.date,
            }),
            UpdateKind::ChatMember(updated) | UpdateKind::MyChatMember(updated) => {
                Update::ChatMemberUpdated(ChatMemberUpdated {
                    chat: TelegramChatWrapper(&updated.chat).to_core(),
                    from: TelegramUserWrapper(&updated.from).to_core(),
                    date: updated.date,
                })
            }
            _ => return None,
        };
        Some(converted)
    }
}
