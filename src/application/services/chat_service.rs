use crate::domain::entities::{AssignmentReason, Chat, ChatId, ChatStatus, CommercialId, NewChat};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::events::DomainEvent;
use crate::domain::ports::chat_repository::ChatRepository;
use crate::domain::ports::event_bus::EventBus;
use crate::domain::ports::time_service::TimeService;
use chrono::Duration;
use std::sync::Arc;

/// Chat lifecycle use cases: load, apply the aggregate transition, store with
/// the version read, then publish what the aggregate emitted.
#[derive(Clone)]
pub struct ChatService {
    chat_repo: Arc<dyn ChatRepository>,
    event_bus: Arc<dyn EventBus>,
    time_service: Arc<dyn TimeService>,
}

impl ChatService {
    pub fn new(
        chat_repo: Arc<dyn ChatRepository>,
        event_bus: Arc<dyn EventBus>,
        time_service: Arc<dyn TimeService>,
    ) -> Self {
        Self {
            chat_repo,
            event_bus,
            time_service,
        }
    }

    pub async fn create_pending_chat(&self, input: NewChat) -> DomainResult<Chat> {
        let (chat, events) = Chat::create_pending(input, self.time_service.now())?;
        self.chat_repo.create(&chat).await?;

        tracing::info!(
            "Chat {} created for visitor {} with priority {}",
            chat.id(),
            chat.visitor_id(),
            chat.priority()
        );
        self.publish(events);
        Ok(chat)
    }

    pub async fn get_chat(&self, chat_id: &ChatId) -> DomainResult<Chat> {
        self.chat_repo
            .find_by_id(chat_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Chat {} not found", chat_id)))
    }

    /// Pending queue, oldest first.
    pub async fn list_pending(&self) -> DomainResult<Vec<Chat>> {
        self.chat_repo.find_by_status(ChatStatus::Pending).await
    }

    pub async fn assign_manually(
        &self,
        chat_id: &ChatId,
        commercial_id: CommercialId,
    ) -> DomainResult<Chat> {
        let now = self.time_service.now();
        self.apply(chat_id, |chat| {
            chat.assign_commercial(commercial_id, AssignmentReason::Manual, now)
        })
        .await
    }

    pub async fn transfer(&self, chat_id: &ChatId, commercial_id: CommercialId) -> DomainResult<Chat> {
        let now = self.time_service.now();
        self.apply(chat_id, |chat| chat.transfer_to(commercial_id, now))
            .await
    }

    pub async fn activate(&self, chat_id: &ChatId) -> DomainResult<Chat> {
        let now = self.time_service.now();
        self.apply(chat_id, |chat| chat.activate(now)).await
    }

    pub async fn close(&self, chat_id: &ChatId, closed_by: &str, reason: &str) -> DomainResult<Chat> {
        let now = self.time_service.now();
        self.apply(chat_id, |chat| chat.close(closed_by, reason, now))
            .await
    }

    pub async fn abandon(&self, chat_id: &ChatId) -> DomainResult<Chat> {
        let now = self.time_service.now();
        self.apply(chat_id, |chat| chat.abandon(now)).await
    }

    /// Re-queues a pending chat for automatic assignment.
    pub async fn request_auto_assignment(
        &self,
        chat_id: &ChatId,
        strategy: Option<String>,
    ) -> DomainResult<()> {
        let chat = self.get_chat(chat_id).await?;
        let event =
            chat.request_auto_assignment("manual_request", strategy, self.time_service.now())?;
        self.publish(vec![event]);
        Ok(())
    }

    /// Abandons every pending chat that has waited longer than `max_wait`.
    /// Chats that changed underneath the sweep are skipped.
    pub async fn abandon_expired(&self, max_wait: Duration) -> DomainResult<Vec<Chat>> {
        let now = self.time_service.now();
        let pending = self.list_pending().await?;

        let mut abandoned = Vec::new();
        for chat in pending {
            if now - chat.created_at() <= max_wait {
                continue;
            }
            match self.store(&chat, chat.abandon(now)).await {
                Ok(next) => abandoned.push(next),
                Err(DomainError::Conflict(_)) | Err(DomainError::InvalidState { .. }) => {
                    tracing::debug!("Chat {} changed during abandon sweep, skipping", chat.id());
                }
                Err(e) => return Err(e),
            }
        }

        if !abandoned.is_empty() {
            tracing::info!("Abandoned {} expired pending chats", abandoned.len());
        }
        Ok(abandoned)
    }

    async fn apply<F>(&self, chat_id: &ChatId, transition: F) -> DomainResult<Chat>
    where
        F: FnOnce(&Chat) -> DomainResult<(Chat, Vec<DomainEvent>)>,
    {
        let chat = self.get_chat(chat_id).await?;
        let outcome = transition(&chat);
        self.store(&chat, outcome).await
    }

    async fn store(
        &self,
        current: &Chat,
        outcome: DomainResult<(Chat, Vec<DomainEvent>)>,
    ) -> DomainResult<Chat> {
        let (next, events) = outcome?;
        self.chat_repo.update(&next, current.version()).await?;

        tracing::info!(
            "Chat {} moved from {} to {}",
            next.id(),
            current.status(),
            next.status()
        );
        self.publish(events);
        Ok(next)
    }

    fn publish(&self, events: Vec<DomainEvent>) {
        if let Err(e) = self.event_bus.publish_all(events) {
            tracing::warn!("Failed to publish chat events: {}", e);
        }
    }
}
