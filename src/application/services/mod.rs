pub mod assignment_orchestrator;
pub mod chat_service;
pub mod connection_service;
pub mod message_routing_service;
pub mod presence_notifier;

pub use assignment_orchestrator::{
    AssignmentOrchestrator, AssignmentOutcome, AssignmentRequest, FALLBACK_REASON,
};
pub use chat_service::ChatService;
pub use connection_service::ConnectionService;
pub use message_routing_service::{DispatchReceipt, MessageRoutingService, MESSAGE_EVENT};
pub use presence_notifier::{DeliveryOutcome, DeliveryReport, PresenceNotifier};
