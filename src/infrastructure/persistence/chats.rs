use crate::domain::entities::{Chat, ChatId, ChatStatus};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::chat_repository::ChatRepository;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Map-backed chat store with version checks on update.
#[derive(Clone, Default)]
pub struct InMemoryChatRepository {
    chats: Arc<Mutex<HashMap<ChatId, Chat>>>,
}

impl InMemoryChatRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatRepository for InMemoryChatRepository {
    async fn create(&self, chat: &Chat) -> DomainResult<()> {
        let mut chats = self.chats.lock().await;
        if chats.contains_key(&chat.id()) {
            return Err(DomainError::Conflict(format!(
                "Chat {} already exists",
                chat.id()
            )));
        }
        chats.insert(chat.id(), chat.clone());
        Ok(())
    }

    async fn update(&self, chat: &Chat, expected_version: i32) -> DomainResult<()> {
        let mut chats = self.chats.lock().await;
        let stored = chats
            .get(&chat.id())
            .ok_or_else(|| DomainError::NotFound(format!("Chat {} not found", chat.id())))?;

        if stored.version() != expected_version {
            return Err(DomainError::Conflict(format!(
                "Chat {} was modified concurrently (expected version {}, found {})",
                chat.id(),
                expected_version,
                stored.version()
            )));
        }

        chats.insert(chat.id(), chat.clone());
        Ok(())
    }

    async fn find_by_id(&self, chat_id: &ChatId) -> DomainResult<Option<Chat>> {
        Ok(self.chats.lock().await.get(chat_id).cloned())
    }

    async fn find_by_status(&self, status: ChatStatus) -> DomainResult<Vec<Chat>> {
        let chats = self.chats.lock().await;
        let mut matching: Vec<Chat> = chats
            .values()
            .filter(|c| c.status() == status)
            .cloned()
            .collect();
        matching.sort_by_key(|c| c.created_at());
        Ok(matching)
    }
}
