use crate::application::services::{AssignmentOrchestrator, AssignmentOutcome, PresenceNotifier};
use crate::domain::entities::{AssignmentReason, CommercialId, ConnectionRole};
use crate::domain::events::DomainEvent;
use crate::domain::ports::commercial_availability::CommercialAvailability;
use crate::domain::ports::event_bus::EventStream;
use crate::domain::ports::task_spawner::TaskSpawner;
use crate::domain::ports::time_service::TimeService;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_stream::StreamExt;

/// Reacts to domain events: runs assignment and pushes presence updates.
#[derive(Clone)]
pub struct RealtimeListener {
    orchestrator: AssignmentOrchestrator,
    notifier: PresenceNotifier,
    availability: Arc<dyn CommercialAvailability>,
    task_spawner: Arc<dyn TaskSpawner>,
    time_service: Arc<dyn TimeService>,
}

impl RealtimeListener {
    pub fn new(
        orchestrator: AssignmentOrchestrator,
        notifier: PresenceNotifier,
        availability: Arc<dyn CommercialAvailability>,
        task_spawner: Arc<dyn TaskSpawner>,
        time_service: Arc<dyn TimeService>,
    ) -> Self {
        Self {
            orchestrator,
            notifier,
            availability,
            task_spawner,
            time_service,
        }
    }

    pub async fn handle(&self, event: DomainEvent) {
        match &event {
            DomainEvent::AutoAssignmentRequested { chat_id, .. } => {
                let orchestrator = self.orchestrator.clone();
                let chat_id = chat_id.clone();
                let event = event.clone();
                self.task_spawner.spawn(Box::pin(async move {
                    match orchestrator.handle_event(&event).await {
                        Ok(AssignmentOutcome::Skipped { status }) => {
                            tracing::debug!("Chat {} is {}, assignment skipped", chat_id, status)
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!("Invalid assignment request for chat {}: {}", chat_id, e)
                        }
                    }
                }));
            }
            DomainEvent::ChatCreated { chat_id, .. } => {
                let payload = event.to_payload();
                match self
                    .notifier
                    .notify_or_broadcast(None, ConnectionRole::Commercial, &payload, event.name())
                    .await
                {
                    Ok(reached) => {
                        tracing::debug!("Chat {} announced to {} commercials", chat_id, reached)
                    }
                    Err(e) => tracing::warn!("Failed to announce chat {}: {}", chat_id, e),
                }
            }
            DomainEvent::CommercialAssigned {
                visitor_id,
                commercial_id,
                previous_commercial_id,
                assignment_reason,
                timestamp,
                ..
            } => {
                let mut recipients = vec![visitor_id.clone(), commercial_id.clone()];
                recipients.extend(previous_commercial_id.iter().cloned());
                self.notify_parties(&event, recipients).await;

                // auto assignments are charged by the orchestrator before publishing
                if *assignment_reason == AssignmentReason::Auto {
                    return;
                }
                if *assignment_reason == AssignmentReason::Transfer {
                    if let Some(previous) = previous_commercial_id {
                        self.release_commercial(previous).await;
                    }
                }
                self.charge_commercial(commercial_id, timestamp).await;
            }
            DomainEvent::ChatActivated {
                visitor_id,
                commercial_id,
                ..
            } => {
                self.notify_parties(&event, vec![visitor_id.clone(), commercial_id.clone()])
                    .await;
            }
            DomainEvent::ChatClosed {
                visitor_id,
                commercial_id,
                ..
            } => {
                let mut recipients = vec![visitor_id.clone()];
                recipients.extend(commercial_id.iter().cloned());
                self.notify_parties(&event, recipients).await;

                if let Some(commercial_id) = commercial_id {
                    self.release_commercial(commercial_id).await;
                }
            }
            DomainEvent::ChatAbandoned { visitor_id, .. } => {
                self.notify_parties(&event, vec![visitor_id.clone()]).await;
            }
            DomainEvent::Connected { user_id, roles, .. } => {
                if roles.contains(&ConnectionRole::Commercial) {
                    self.set_presence(user_id, true).await;
                }
            }
            DomainEvent::Disconnected { user_id, roles, .. } => {
                if roles.contains(&ConnectionRole::Commercial) {
                    self.set_presence(user_id, false).await;
                }
            }
            DomainEvent::MessageSent { .. } => {
                tracing::debug!("Realtime listener ignoring {}", event.name());
            }
        }
    }

    async fn notify_parties(&self, event: &DomainEvent, recipients: Vec<String>) {
        let report = self
            .notifier
            .notify_many(&recipients, &event.to_payload(), event.name())
            .await;
        for (recipient, error) in report.failed {
            tracing::warn!("{} not delivered to {}: {}", event.name(), recipient, error);
        }
    }

    async fn charge_commercial(&self, commercial_id: &str, timestamp: &str) {
        let Ok(id) = commercial_id.parse::<CommercialId>() else {
            tracing::warn!("Assignment names malformed commercial id {}", commercial_id);
            return;
        };
        let at = DateTime::parse_from_rfc3339(timestamp)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| self.time_service.now());
        if let Err(e) = self.availability.record_assignment(&id, at).await {
            tracing::warn!("Could not record assignment for {}: {}", commercial_id, e);
        }
    }

    async fn release_commercial(&self, commercial_id: &str) {
        let Ok(id) = commercial_id.parse::<CommercialId>() else {
            tracing::warn!("Chat event names malformed commercial id {}", commercial_id);
            return;
        };
        if let Err(e) = self.availability.release_chat(&id).await {
            tracing::warn!("Could not release chat slot for {}: {}", commercial_id, e);
        }
    }

    async fn set_presence(&self, user_id: &str, online: bool) {
        let Ok(id) = user_id.parse::<CommercialId>() else {
            tracing::debug!("Commercial {} has no presence record", user_id);
            return;
        };
        match self.availability.set_online(&id, online).await {
            Ok(()) => tracing::debug!("Commercial {} marked online={}", user_id, online),
            Err(e) => tracing::debug!("Presence for {} not recorded: {}", user_id, e),
        }
    }
}

/// Drains `receiver` until the bus closes. Subscribe before spawning so that
/// events published in between are not lost.
pub async fn run_realtime_listener(mut receiver: EventStream, listener: RealtimeListener) {
    tracing::info!("Realtime listener started");

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(event) => {
                tracing::debug!("Realtime listener received {}", event.name());
                listener.handle(event).await;
            }
            Err(e) => {
                tracing::warn!("Realtime listener lagged: {}", e);
            }
        }
    }

    tracing::info!("Realtime listener stopped");
}
