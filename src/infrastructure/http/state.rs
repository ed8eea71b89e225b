use crate::application::services::{ChatService, ConnectionService, MessageRoutingService};
use crate::domain::ports::assignment_rules_repository::AssignmentRulesRepository;
use crate::infrastructure::providers::InMemoryCommercialPresence;
use crate::infrastructure::realtime::ChannelTransport;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub connection_service: ConnectionService,
    pub chat_service: ChatService,
    pub message_routing: MessageRoutingService,
    pub commercial_presence: Arc<InMemoryCommercialPresence>,
    pub rules_repo: Arc<dyn AssignmentRulesRepository>,
    pub transport: Arc<ChannelTransport>,
    pub realtime_channel_capacity: usize,
}
