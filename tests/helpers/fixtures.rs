#![allow(dead_code)]
use super::doubles::{FixedClock, ManualTaskSpawner, RecordingTransport};
use chrono::Duration;
use oxichat::application::listeners::RealtimeListener;
use oxichat::application::services::{
    AssignmentOrchestrator, ChatService, ConnectionService, MessageRoutingService,
    PresenceNotifier,
};
use oxichat::domain::entities::{
    Chat, CommercialId, CommercialInfo, ConnectionRole, NewChat, VisitorId,
};
use oxichat::domain::ports::commercial_availability::CommercialAvailability;
use oxichat::domain::ports::event_bus::EventStream;
use oxichat::domain::ports::event_bus::EventBus;
use oxichat::infrastructure::events::LocalEventBus;
use oxichat::infrastructure::persistence::{
    InMemoryAssignmentRulesRepository, InMemoryChatRepository, InMemoryConnectionRegistry,
    InMemoryMessageRepository,
};
use oxichat::infrastructure::providers::InMemoryCommercialPresence;
use std::sync::Arc;

pub const COMPANY: &str = "acme";
pub const FALLBACK_DELAY: std::time::Duration = std::time::Duration::from_millis(5000);

/// Every service wired over in-memory adapters and deterministic doubles.
pub struct Harness {
    pub clock: Arc<FixedClock>,
    pub spawner: Arc<ManualTaskSpawner>,
    pub transport: Arc<RecordingTransport>,
    pub bus: Arc<LocalEventBus>,
    pub registry: Arc<InMemoryConnectionRegistry>,
    pub chats: Arc<InMemoryChatRepository>,
    pub messages: Arc<InMemoryMessageRepository>,
    pub rules: Arc<InMemoryAssignmentRulesRepository>,
    pub presence: Arc<InMemoryCommercialPresence>,
    pub notifier: PresenceNotifier,
    pub connections: ConnectionService,
    pub chat_service: ChatService,
    pub routing: MessageRoutingService,
    pub orchestrator: AssignmentOrchestrator,
}

impl Harness {
    pub fn new() -> Self {
        let clock = Arc::new(FixedClock::new());
        let spawner = Arc::new(ManualTaskSpawner::new());
        let transport = Arc::new(RecordingTransport::new());
        let bus = Arc::new(LocalEventBus::new(256));
        let registry = Arc::new(InMemoryConnectionRegistry::new());
        let chats = Arc::new(InMemoryChatRepository::new());
        let messages = Arc::new(InMemoryMessageRepository::new());
        let rules = Arc::new(InMemoryAssignmentRulesRepository::new());
        let presence = Arc::new(InMemoryCommercialPresence::new(
            Duration::seconds(60),
            clock.clone(),
        ));

        let notifier = PresenceNotifier::new(registry.clone(), transport.clone());
        let connections = ConnectionService::new(registry.clone(), bus.clone(), clock.clone());
        let chat_service = ChatService::new(chats.clone(), bus.clone(), clock.clone());
        let routing = MessageRoutingService::new(
            chats.clone(),
            messages.clone(),
            registry.clone(),
            bus.clone(),
            clock.clone(),
            notifier.clone(),
        );
        let orchestrator = AssignmentOrchestrator::new(
            chats.clone(),
            rules.clone(),
            presence.clone(),
            bus.clone(),
            spawner.clone(),
            clock.clone(),
            FALLBACK_DELAY,
        );

        Self {
            clock,
            spawner,
            transport,
            bus,
            registry,
            chats,
            messages,
            rules,
            presence,
            notifier,
            connections,
            chat_service,
            routing,
            orchestrator,
        }
    }

    pub fn listener(&self) -> RealtimeListener {
        RealtimeListener::new(
            self.orchestrator.clone(),
            self.notifier.clone(),
            self.presence.clone(),
            self.spawner.clone(),
            self.clock.clone(),
        )
    }

    pub fn subscribe(&self) -> EventStream {
        self.bus.subscribe()
    }

    /// Registers an online commercial with the given workload.
    pub async fn commercial(&self, name: &str, current_chats: u32, max_chats: u32) -> CommercialId {
        let mut info = CommercialInfo::new(CommercialId::new(), name, max_chats);
        info.current_chats = current_chats;
        let id = info.id;
        self.presence.register(info, COMPANY, vec![]).await;
        id
    }

    pub async fn offline_commercial(&self, name: &str, max_chats: u32) -> CommercialId {
        let mut info = CommercialInfo::new(CommercialId::new(), name, max_chats);
        info.is_online = false;
        let id = info.id;
        self.presence.register(info, COMPANY, vec![]).await;
        id
    }

    pub async fn live_info(&self, id: CommercialId) -> CommercialInfo {
        self.presence
            .get_commercials(&[id])
            .await
            .unwrap()
            .pop()
            .expect("commercial registered")
    }

    /// Stores a pending chat for the company without going through the bus.
    pub async fn pending_chat(&self, candidates: Vec<CommercialId>) -> Chat {
        let mut metadata = oxichat::domain::entities::ChatMetadata::default();
        metadata.company_id = Some(COMPANY.to_string());
        let input = NewChat::new(VisitorId::new(), candidates).with_metadata(metadata);
        self.chat_service.create_pending_chat(input).await.unwrap()
    }

    pub async fn connect(&self, user_id: &str, socket_id: &str, role: ConnectionRole) {
        self.connections
            .on_connect(user_id, socket_id, vec![role])
            .await
            .unwrap();
    }
}
