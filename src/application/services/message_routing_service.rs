use crate::application::services::presence_notifier::{DeliveryReport, PresenceNotifier};
use crate::domain::entities::{
    Chat, ChatId, ChatMessage, ConnectionCriteria, ConnectionRole, ConnectionUser,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::chat_repository::ChatRepository;
use crate::domain::ports::connection_repository::ConnectionRepository;
use crate::domain::ports::event_bus::EventBus;
use crate::domain::ports::message_repository::MessageRepository;
use crate::domain::ports::time_service::TimeService;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;

pub const MESSAGE_EVENT: &str = "chat.message";

const MAX_RECORD_RETRIES: u32 = 3;
const RETRY_DELAYS_MS: [u64; 3] = [10, 25, 50];

/// What happened to a dispatched message. The message is stored even when
/// `delivery` is an error.
#[derive(Debug, Clone)]
pub struct DispatchReceipt {
    pub message: ChatMessage,
    pub delivery: DomainResult<DeliveryReport>,
}

#[derive(Clone)]
pub struct MessageRoutingService {
    chat_repo: Arc<dyn ChatRepository>,
    message_repo: Arc<dyn MessageRepository>,
    registry: Arc<dyn ConnectionRepository>,
    event_bus: Arc<dyn EventBus>,
    time_service: Arc<dyn TimeService>,
    notifier: PresenceNotifier,
}

impl MessageRoutingService {
    pub fn new(
        chat_repo: Arc<dyn ChatRepository>,
        message_repo: Arc<dyn MessageRepository>,
        registry: Arc<dyn ConnectionRepository>,
        event_bus: Arc<dyn EventBus>,
        time_service: Arc<dyn TimeService>,
        notifier: PresenceNotifier,
    ) -> Self {
        Self {
            chat_repo,
            message_repo,
            registry,
            event_bus,
            time_service,
            notifier,
        }
    }

    /// Delivers to every connected participant on the other side of the chat.
    /// Zero deliveries is a `NoReceivers` error.
    pub async fn route(
        &self,
        chat_id: &ChatId,
        sender_id: &str,
        message: &str,
        timestamp: DateTime<Utc>,
    ) -> DomainResult<DeliveryReport> {
        let chat = self.load_chat(chat_id).await?;
        let sender_is_visitor = sender_side(&chat, sender_id)?;

        let counterparts: Vec<String> = chat
            .participants()
            .into_iter()
            .filter(|p| p.is_visitor != sender_is_visitor)
            .map(|p| p.id)
            .collect();

        let payload = json!({
            "chat_id": chat_id.to_string(),
            "sender_id": sender_id,
            "content": message,
            "timestamp": timestamp.to_rfc3339(),
        });
        let report = self
            .notifier
            .notify_many(&counterparts, &payload, MESSAGE_EVENT)
            .await;

        for (recipient, error) in &report.failed {
            tracing::warn!("Message for chat {} not delivered to {}: {}", chat_id, recipient, error);
        }

        if report.delivered.is_empty() {
            return Err(DomainError::NoReceivers {
                chat_id: chat_id.to_string(),
            });
        }
        Ok(report)
    }

    /// Count on the chat, persist, publish `MessageSent`, then route. A chat
    /// that closes or keeps changing before the count lands stores nothing.
    pub async fn dispatch(
        &self,
        chat_id: &ChatId,
        sender_id: &str,
        content: &str,
    ) -> DomainResult<DispatchReceipt> {
        let now = self.time_service.now();
        let chat = self.load_chat(chat_id).await?;
        let is_from_visitor = sender_side(&chat, sender_id)?;
        // Validates the chat still accepts messages before anything is stored.
        chat.record_message(sender_id, content, now)?;

        self.record_on_chat(chat_id, sender_id, content, now).await?;
        let message = ChatMessage::new(*chat_id, sender_id, content, is_from_visitor, now);
        if let Err(e) = self.message_repo.save(&message).await {
            tracing::error!("Message counted on chat {} but not stored: {}", chat_id, e);
            return Err(e);
        }

        let sender = self.resolve_sender(sender_id, is_from_visitor).await?;
        let event = sender.send_message(message.id, *chat_id, content, now);
        if let Err(e) = self.event_bus.publish(event) {
            tracing::warn!("Failed to publish message event for chat {}: {}", chat_id, e);
        }

        let delivery = self.route(chat_id, sender_id, content, now).await;
        if let Err(e) = &delivery {
            tracing::info!("Message {} stored but not delivered: {}", message.id, e);
        }

        Ok(DispatchReceipt { message, delivery })
    }

    pub async fn history(&self, chat_id: &ChatId) -> DomainResult<Vec<ChatMessage>> {
        self.load_chat(chat_id).await?;
        self.message_repo.find_by_chat(chat_id).await
    }

    async fn record_on_chat(
        &self,
        chat_id: &ChatId,
        sender_id: &str,
        content: &str,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        for attempt in 0..=MAX_RECORD_RETRIES {
            let chat = self.load_chat(chat_id).await?;
            let next = chat.record_message(sender_id, content, at)?;
            match self.chat_repo.update(&next, chat.version()).await {
                Ok(()) => return Ok(()),
                Err(DomainError::Conflict(_)) if attempt < MAX_RECORD_RETRIES => {
                    let delay_ms = RETRY_DELAYS_MS[attempt as usize];
                    tracing::debug!(
                        "Conflict recording message on chat {}, retrying in {}ms",
                        chat_id,
                        delay_ms
                    );
                    self.time_service
                        .sleep(std::time::Duration::from_millis(delay_ms))
                        .await;
                }
                Err(e) => return Err(e),
            }
        }
        Err(DomainError::Conflict(format!(
            "chat {} kept changing while recording a message",
            chat_id
        )))
    }

    async fn resolve_sender(&self, sender_id: &str, is_visitor: bool) -> DomainResult<ConnectionUser> {
        let known = self
            .registry
            .find_one(&ConnectionCriteria::by_user(sender_id))
            .await?;
        let role = if is_visitor {
            ConnectionRole::Visitor
        } else {
            ConnectionRole::Commercial
        };
        Ok(known.unwrap_or_else(|| ConnectionUser::new(sender_id, [role])))
    }

    async fn load_chat(&self, chat_id: &ChatId) -> DomainResult<Chat> {
        self.chat_repo
            .find_by_id(chat_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Chat {} not found", chat_id)))
    }
}

fn sender_side(chat: &Chat, sender_id: &str) -> DomainResult<bool> {
    chat.participants()
        .into_iter()
        .find(|p| p.id == sender_id)
        .map(|p| p.is_visitor)
        .ok_or_else(|| {
            DomainError::ValidationError(format!(
                "{} is not a participant of chat {}",
                sender_id,
                chat.id()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{AssignmentReason, ChatStatus, CommercialId, NewChat, VisitorId};
    use crate::infrastructure::events::LocalEventBus;
    use crate::infrastructure::persistence::{
        InMemoryChatRepository, InMemoryConnectionRegistry, InMemoryMessageRepository,
    };
    use crate::infrastructure::realtime::ChannelTransport;
    use crate::infrastructure::runtime::TokioTimeService;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    /// Closes the chat right after the first read, as a concurrent close would.
    struct ClosingChatRepository {
        inner: InMemoryChatRepository,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl ChatRepository for ClosingChatRepository {
        async fn create(&self, chat: &Chat) -> DomainResult<()> {
            self.inner.create(chat).await
        }

        async fn update(&self, chat: &Chat, expected_version: i32) -> DomainResult<()> {
            self.inner.update(chat, expected_version).await
        }

        async fn find_by_id(&self, chat_id: &ChatId) -> DomainResult<Option<Chat>> {
            if self.reads.fetch_add(1, Ordering::SeqCst) == 1 {
                if let Some(chat) = self.inner.find_by_id(chat_id).await? {
                    let (closed, _) = chat.close("visitor", "left", Utc::now())?;
                    self.inner.update(&closed, chat.version()).await?;
                }
            }
            self.inner.find_by_id(chat_id).await
        }

        async fn find_by_status(&self, status: ChatStatus) -> DomainResult<Vec<Chat>> {
            self.inner.find_by_status(status).await
        }
    }

    struct Fixture {
        service: MessageRoutingService,
        chats: Arc<InMemoryChatRepository>,
        messages: Arc<InMemoryMessageRepository>,
        registry: Arc<InMemoryConnectionRegistry>,
        transport: Arc<ChannelTransport>,
    }

    fn fixture() -> Fixture {
        let chats = Arc::new(InMemoryChatRepository::new());
        let messages = Arc::new(InMemoryMessageRepository::new());
        let registry = Arc::new(InMemoryConnectionRegistry::new());
        let transport = Arc::new(ChannelTransport::new());
        let notifier = PresenceNotifier::new(registry.clone(), transport.clone());
        let service = MessageRoutingService::new(
            chats.clone(),
            messages.clone(),
            registry.clone(),
            Arc::new(LocalEventBus::new(16)),
            Arc::new(TokioTimeService),
            notifier,
        );
        Fixture {
            service,
            chats,
            messages,
            registry,
            transport,
        }
    }

    async fn assigned_chat(chats: &InMemoryChatRepository) -> (Chat, CommercialId) {
        let commercial = CommercialId::new();
        let now = Utc::now();
        let (chat, _) =
            Chat::create_pending(NewChat::new(VisitorId::new(), vec![commercial]), now).unwrap();
        let (chat, _) = chat
            .assign_commercial(commercial, AssignmentReason::Manual, now)
            .unwrap();
        chats.create(&chat).await.unwrap();
        (chat, commercial)
    }

    #[tokio::test]
    async fn test_visitor_message_reaches_commercial() {
        let f = fixture();
        let (chat, commercial) = assigned_chat(&f.chats).await;

        let (user, _) = ConnectionUser::new(commercial.to_string(), [ConnectionRole::Commercial])
            .connect("agent-socket", Utc::now());
        f.registry.save(&user).await.unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        f.transport
            .register_socket("agent-socket", user.roles().clone(), tx)
            .await;

        let receipt = f
            .service
            .dispatch(&chat.id(), &chat.visitor_id().to_string(), "hola")
            .await
            .unwrap();

        let report = receipt.delivery.unwrap();
        assert_eq!(report.delivered, vec![commercial.to_string()]);
        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.event, MESSAGE_EVENT);
        assert_eq!(frame.payload["content"], "hola");

        let stored = f.chats.find_by_id(&chat.id()).await.unwrap().unwrap();
        assert_eq!(stored.total_messages(), 1);
    }

    #[tokio::test]
    async fn test_non_participant_rejected() {
        let f = fixture();
        let (chat, _) = assigned_chat(&f.chats).await;

        let result = f.service.dispatch(&chat.id(), "stranger", "hi").await;
        assert!(matches!(result, Err(DomainError::ValidationError(_))));
        assert!(f.messages.find_by_chat(&chat.id()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commercial_reply_sets_first_response() {
        let f = fixture();
        let (chat, commercial) = assigned_chat(&f.chats).await;

        let receipt = f
            .service
            .dispatch(&chat.id(), &commercial.to_string(), "how can I help?")
            .await
            .unwrap();
        assert!(matches!(receipt.delivery, Err(DomainError::NoReceivers { .. })));

        let stored = f.chats.find_by_id(&chat.id()).await.unwrap().unwrap();
        assert!(stored.first_response_time().is_some());
    }

    #[tokio::test]
    async fn test_chat_closed_mid_dispatch_stores_nothing() {
        let chats = Arc::new(ClosingChatRepository {
            inner: InMemoryChatRepository::new(),
            reads: AtomicUsize::new(0),
        });
        let messages = Arc::new(InMemoryMessageRepository::new());
        let registry = Arc::new(InMemoryConnectionRegistry::new());
        let notifier = PresenceNotifier::new(registry.clone(), Arc::new(ChannelTransport::new()));
        let service = MessageRoutingService::new(
            chats.clone(),
            messages.clone(),
            registry,
            Arc::new(LocalEventBus::new(16)),
            Arc::new(TokioTimeService),
            notifier,
        );
        let (chat, _) = assigned_chat(&chats.inner).await;

        let result = service
            .dispatch(&chat.id(), &chat.visitor_id().to_string(), "still there?")
            .await;

        assert!(matches!(result, Err(DomainError::InvalidState { .. })));
        assert!(messages.find_by_chat(&chat.id()).await.unwrap().is_empty());
        let stored = chats.inner.find_by_id(&chat.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), ChatStatus::Closed);
        assert_eq!(stored.total_messages(), 0);
    }
}
