use crate::domain::entities::chat::{AssignmentReason, ChatPriority, ChatStatus};
use crate::domain::entities::connection_user::ConnectionRole;
use serde::{Deserialize, Serialize};

/// Outbound events. Every field is a primitive snapshot so handlers never
/// need to reach back into the aggregate that emitted them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    ChatCreated {
        chat_id: String,
        visitor_id: String,
        status: ChatStatus,
        priority: ChatPriority,
        available_commercial_ids: Vec<String>,
        department: Option<String>,
        company_id: Option<String>,
        site_id: Option<String>,
        timestamp: String, // ISO 8601
    },
    AutoAssignmentRequested {
        chat_id: String,
        visitor_id: String,
        available_commercial_ids: Vec<String>,
        required_skills: Vec<String>,
        strategy: Option<String>,
        max_wait_time_seconds: Option<u64>,
        reason: String,
        company_id: Option<String>,
        site_id: Option<String>,
        timestamp: String, // ISO 8601
    },
    CommercialAssigned {
        chat_id: String,
        visitor_id: String,
        commercial_id: String,
        previous_commercial_id: Option<String>,
        assignment_reason: AssignmentReason,
        timestamp: String, // ISO 8601
    },
    ChatActivated {
        chat_id: String,
        visitor_id: String,
        commercial_id: String,
        timestamp: String, // ISO 8601
    },
    ChatAbandoned {
        chat_id: String,
        visitor_id: String,
        waited_seconds: i64,
        timestamp: String, // ISO 8601
    },
    ChatClosed {
        chat_id: String,
        visitor_id: String,
        commercial_id: Option<String>,
        closed_by: String,
        reason: String,
        duration_seconds: i64,
        total_messages: u32,
        was_closed_by_visitor: bool,
        was_closed_by_commercial: bool,
        timestamp: String, // ISO 8601
    },
    Connected {
        user_id: String,
        socket_id: String,
        roles: Vec<ConnectionRole>,
        timestamp: String, // ISO 8601
    },
    Disconnected {
        user_id: String,
        socket_id: Option<String>,
        roles: Vec<ConnectionRole>,
        timestamp: String, // ISO 8601
    },
    MessageSent {
        message_id: String,
        chat_id: String,
        sender_id: String,
        content: String,
        timestamp: String, // ISO 8601
    },
}

impl DomainEvent {
    /// Event name as emitted on the realtime transport.
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::ChatCreated { .. } => "chat.created",
            DomainEvent::AutoAssignmentRequested { .. } => "chat.auto_assignment_requested",
            DomainEvent::CommercialAssigned { .. } => "chat.commercial_assigned",
            DomainEvent::ChatActivated { .. } => "chat.activated",
            DomainEvent::ChatAbandoned { .. } => "chat.abandoned",
            DomainEvent::ChatClosed { .. } => "chat.closed",
            DomainEvent::Connected { .. } => "presence.connected",
            DomainEvent::Disconnected { .. } => "presence.disconnected",
            DomainEvent::MessageSent { .. } => "message.sent",
        }
    }

    pub fn chat_id(&self) -> Option<&str> {
        match self {
            DomainEvent::ChatCreated { chat_id, .. }
            | DomainEvent::AutoAssignmentRequested { chat_id, .. }
            | DomainEvent::CommercialAssigned { chat_id, .. }
            | DomainEvent::ChatActivated { chat_id, .. }
            | DomainEvent::ChatAbandoned { chat_id, .. }
            | DomainEvent::ChatClosed { chat_id, .. }
            | DomainEvent::MessageSent { chat_id, .. } => Some(chat_id),
            DomainEvent::Connected { .. } | DomainEvent::Disconnected { .. } => None,
        }
    }

    /// JSON payload pushed to sockets.
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            tracing::error!("Failed to serialize domain event {}: {}", self.name(), e);
            serde_json::Value::Null
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = DomainEvent::ChatAbandoned {
            chat_id: "c1".to_string(),
            visitor_id: "v1".to_string(),
            waited_seconds: 30,
            timestamp: "2026-01-12T10:00:00Z".to_string(),
        };

        let payload = event.to_payload();
        assert_eq!(payload["type"], "chat_abandoned");
        assert_eq!(payload["waited_seconds"], 30);
        assert_eq!(event.chat_id(), Some("c1"));
    }

    #[test]
    fn test_presence_events_have_no_chat() {
        let event = DomainEvent::Disconnected {
            user_id: "u1".to_string(),
            socket_id: None,
            roles: vec![ConnectionRole::Visitor],
            timestamp: "2026-01-12T10:00:00Z".to_string(),
        };
        assert_eq!(event.chat_id(), None);
        assert_eq!(event.name(), "presence.disconnected");
    }
}
