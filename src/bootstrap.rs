use crate::application::listeners::{run_realtime_listener, RealtimeListener};
use crate::application::services::*;
use crate::config::Config;
use crate::domain::ports::assignment_rules_repository::AssignmentRulesRepository;
use crate::domain::ports::chat_repository::ChatRepository;
use crate::domain::ports::commercial_availability::CommercialAvailability;
use crate::domain::ports::connection_repository::ConnectionRepository;
use crate::domain::ports::event_bus::EventBus;
use crate::domain::ports::message_repository::MessageRepository;
use crate::domain::ports::task_spawner::TaskSpawner;
use crate::domain::ports::time_service::TimeService;
use crate::infrastructure::events::LocalEventBus;
use crate::infrastructure::http::AppState;
use crate::infrastructure::persistence::{
    InMemoryAssignmentRulesRepository, InMemoryChatRepository, InMemoryConnectionRegistry,
    InMemoryMessageRepository,
};
use crate::infrastructure::providers::InMemoryCommercialPresence;
use crate::infrastructure::realtime::ChannelTransport;
use crate::infrastructure::runtime::{TokioTaskSpawner, TokioTimeService};
use std::sync::Arc;

/// Wires adapters into services and starts the realtime listener.
pub fn build_app_state(config: &Config) -> AppState {
    let task_spawner: Arc<dyn TaskSpawner> = Arc::new(TokioTaskSpawner::new());
    let time_service: Arc<dyn TimeService> = Arc::new(TokioTimeService::new());

    let event_bus = Arc::new(LocalEventBus::new(config.event_bus_capacity));
    tracing::info!(
        "Event bus initialized with capacity {}",
        config.event_bus_capacity
    );

    let registry: Arc<dyn ConnectionRepository> = Arc::new(InMemoryConnectionRegistry::new());
    let chat_repo: Arc<dyn ChatRepository> = Arc::new(InMemoryChatRepository::new());
    let message_repo: Arc<dyn MessageRepository> = Arc::new(InMemoryMessageRepository::new());
    let rules_repo: Arc<dyn AssignmentRulesRepository> =
        Arc::new(InMemoryAssignmentRulesRepository::new());
    let commercial_presence = Arc::new(InMemoryCommercialPresence::new(
        config.heartbeat_timeout(),
        time_service.clone(),
    ));
    let transport = Arc::new(ChannelTransport::new());

    let notifier = PresenceNotifier::new(registry.clone(), transport.clone());
    let connection_service =
        ConnectionService::new(registry.clone(), event_bus.clone(), time_service.clone());
    let chat_service = ChatService::new(chat_repo.clone(), event_bus.clone(), time_service.clone());
    let message_routing = MessageRoutingService::new(
        chat_repo.clone(),
        message_repo,
        registry,
        event_bus.clone(),
        time_service.clone(),
        notifier.clone(),
    );
    let orchestrator = AssignmentOrchestrator::new(
        chat_repo,
        rules_repo.clone(),
        commercial_presence.clone(),
        event_bus.clone(),
        task_spawner.clone(),
        time_service.clone(),
        config.fallback_delay(),
    );
    tracing::info!(
        "Assignment orchestrator ready (fallback after {}ms)",
        config.assignment_fallback_delay_ms
    );

    // Subscribe before returning so no event published afterwards is missed.
    let listener_bus: Arc<dyn EventBus> = event_bus;
    let availability: Arc<dyn CommercialAvailability> = commercial_presence.clone();
    let listener = RealtimeListener::new(
        orchestrator,
        notifier,
        availability,
        task_spawner.clone(),
        time_service,
    );
    let events = listener_bus.subscribe();
    task_spawner.spawn(Box::pin(async move {
        run_realtime_listener(events, listener).await;
    }));

    AppState {
        connection_service,
        chat_service,
        message_routing,
        commercial_presence,
        rules_repo,
        transport,
        realtime_channel_capacity: config.realtime_channel_capacity,
    }
}
