pub mod line;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::AddressingMode;

/// Where an inbound message came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageSource {
    User {
        user_id: String,
    },
    Group {
        group_id: String,
        user_id: Option<String>,
    },
    Room {
        room_id: String,
        user_id: Option<String>,
    },
}

impl MessageSource {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            MessageSource::User { user_id } => Some(user_id.as_str()),
            MessageSource::Group { user_id, .. } | MessageSource::Room { user_id, .. } => {
                user_id.as_deref()
            }
        }
    }

    /// Group or room ID; `None` for one-to-one chats.
    pub fn chat_id(&self) -> Option<&str> {
        match self {
            MessageSource::User { .. } => None,
            MessageSource::Group { group_id, .. } => Some(group_id.as_str()),
            MessageSource::Room { room_id, .. } => Some(room_id.as_str()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            MessageSource::User { .. } => "user",
            MessageSource::Group { .. } => "group",
            MessageSource::Room { .. } => "room",
        }
    }

    /// The identifier this source contributes to the recipient registry.
    pub fn recipient_id(&self, mode: AddressingMode) -> Option<&str> {
        match mode {
            AddressingMode::Chat => self.chat_id(),
            AddressingMode::User => self.user_id(),
        }
    }
}

/// A text message received from the platform
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub source: MessageSource,
    /// Single-use handle for answering this message
    pub reply_token: String,
    /// The message text
    pub text: String,
}

/// Outbound side of the messaging platform.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Answer an inbound event through its reply token.
    async fn reply_text(&self, reply_token: &str, text: &str) -> Result<()>;

    /// Push a message to a user, group or room.
    async fn push_text(&self, to: &str, text: &str) -> Result<()>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_mode_ignores_direct_messages() {
        let source = MessageSource::User {
            user_id: "U1".into(),
        };
        assert_eq!(source.recipient_id(AddressingMode::Chat), None);
        assert_eq!(source.recipient_id(AddressingMode::User), Some("U1"));
    }

    #[test]
    fn test_chat_mode_uses_group_and_room_ids() {
        let group = MessageSource::Group {
            group_id: "C1".into(),
            user_id: Some("U1".into()),
        };
        let room = MessageSource::Room {
            room_id: "R1".into(),
            user_id: None,
        };
        assert_eq!(group.recipient_id(AddressingMode::Chat), Some("C1"));
        assert_eq!(room.recipient_id(AddressingMode::Chat), Some("R1"));
        assert_eq!(group.recipient_id(AddressingMode::User), Some("U1"));
        assert_eq!(room.recipient_id(AddressingMode::User), None);
    }
}
