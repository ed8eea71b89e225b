use crate::domain::entities::{ChatId, ChatMessage};
use crate::domain::errors::DomainResult;
use crate::domain::ports::message_repository::MessageRepository;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone, Default)]
pub struct InMemoryMessageRepository {
    messages: Arc<Mutex<HashMap<ChatId, Vec<ChatMessage>>>>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn save(&self, message: &ChatMessage) -> DomainResult<()> {
        self.messages
            .lock()
            .await
            .entry(message.chat_id)
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn find_by_chat(&self, chat_id: &ChatId) -> DomainResult<Vec<ChatMessage>> {
        Ok(self
            .messages
            .lock()
            .await
            .get(chat_id)
            .cloned()
            .unwrap_or_default())
    }
}
