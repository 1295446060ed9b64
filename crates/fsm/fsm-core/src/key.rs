//! Conversation key derivation.

use std::fmt;

/// Stand-in for a user or chat id the update did not carry.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Storage key of one conversation: `"{client_id}-{user_id}-{chat_id}"`.
///
/// Missing ids degrade to [`UNKNOWN_IDENTITY`] rather than failing, so updates without a sender
/// (channel posts) or without a chat (inline queries) still map to a stable key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationKey(String);

impl ConversationKey {
    pub fn from_parts(client_id: i64, user_id: Option<i64>, chat_id: Option<i64>) -> Self {
        let user = user_id.map_or_else(|| UNKNOWN_IDENTITY.to_string(), |id| id.to_string());
        let chat = chat_id.map_or_else(|| UNKNOWN_IDENTITY.to_string(), |id| id.to_string());
        Self(format!("{}-{}-{}", client_id, user, chat))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ConversationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<ConversationKey> for String {
    fn from(key: ConversationKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_identity() {
        assert_eq!(ConversationKey::from_parts(1, Some(2), Some(3)).as_str(), "1-2-3");
    }

    #[test]
    fn test_missing_parts_use_sentinel() {
        assert_eq!(
            ConversationKey::from_parts(1, None, Some(-100)).to_string(),
            "1-unknown--100"
        );
        assert_eq!(
            ConversationKey::from_parts(1, Some(2), None).as_str(),
            "1-2-unknown"
        );
        assert_eq!(
            ConversationKey::from_parts(1, None, None).as_str(),
            "1-unknown-unknown"
        );
    }
}
