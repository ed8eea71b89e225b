use crate::domain::entities::{ChatId, ChatMessage};
use crate::domain::errors::DomainResult;

/// Message persistence. Independent of delivery: a message is stored even
/// when nobody is connected to receive it.
#[async_trait::async_trait]
pub trait MessageRepository: Send + Sync {
    async fn save(&self, message: &ChatMessage) -> DomainResult<()>;

    async fn find_by_chat(&self, chat_id: &ChatId) -> DomainResult<Vec<ChatMessage>>;
}
