use crate::domain::entities::ids::{ChatId, MessageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender_id: String,
    pub content: String,
    pub is_from_visitor: bool,
    pub sent_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(
        chat_id: ChatId,
        sender_id: impl Into<String>,
        content: impl Into<String>,
        is_from_visitor: bool,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            chat_id,
            sender_id: sender_id.into(),
            content: content.into(),
            is_from_visitor,
            sent_at,
        }
    }
}
