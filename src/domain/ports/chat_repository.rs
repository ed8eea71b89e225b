use crate::domain::entities::{Chat, ChatId, ChatStatus};
use crate::domain::errors::DomainResult;
use async_trait::async_trait;

#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Insert a new chat. Fails with `Conflict` if the id already exists.
    async fn create(&self, chat: &Chat) -> DomainResult<()>;

    /// Replace a stored chat only if its version still equals `expected_version`.
    /// A stale version fails with `Conflict` so concurrent writers cannot
    /// silently overwrite each other.
    async fn update(&self, chat: &Chat, expected_version: i32) -> DomainResult<()>;

    async fn find_by_id(&self, chat_id: &ChatId) -> DomainResult<Option<Chat>>;

    async fn find_by_status(&self, status: ChatStatus) -> DomainResult<Vec<Chat>>;
}
