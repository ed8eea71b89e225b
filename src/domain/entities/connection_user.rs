use crate::domain::entities::ids::{ChatId, MessageId};
use crate::domain::errors::DomainError;
use crate::domain::events::DomainEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionRole {
    Visitor,
    Commercial,
}

impl fmt::Display for ConnectionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionRole::Visitor => write!(f, "visitor"),
            ConnectionRole::Commercial => write!(f, "commercial"),
        }
    }
}

impl FromStr for ConnectionRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "visitor" => Ok(ConnectionRole::Visitor),
            "commercial" => Ok(ConnectionRole::Commercial),
            other => Err(DomainError::ValidationError(format!(
                "unknown connection role '{}'",
                other
            ))),
        }
    }
}

/// Transport mapping for one principal. Identity is the user id; a user owns
/// at most one socket at a time and `socket_id == None` means disconnected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionUser {
    user_id: String,
    socket_id: Option<String>,
    roles: BTreeSet<ConnectionRole>,
}

impl ConnectionUser {
    pub fn new(user_id: impl Into<String>, roles: impl IntoIterator<Item = ConnectionRole>) -> Self {
        Self {
            user_id: user_id.into(),
            socket_id: None,
            roles: roles.into_iter().collect(),
        }
    }

    pub fn connect(&self, socket_id: &str, now: DateTime<Utc>) -> (ConnectionUser, DomainEvent) {
        let mut next = self.clone();
        next.socket_id = Some(socket_id.to_string());

        let event = DomainEvent::Connected {
            user_id: next.user_id.clone(),
            socket_id: socket_id.to_string(),
            roles: next.role_list(),
            timestamp: now.to_rfc3339(),
        };
        (next, event)
    }

    pub fn disconnect(&self, now: DateTime<Utc>) -> (ConnectionUser, DomainEvent) {
        let mut next = self.clone();
        let previous = next.socket_id.take();

        let event = DomainEvent::Disconnected {
            user_id: next.user_id.clone(),
            socket_id: previous,
            roles: next.role_list(),
            timestamp: now.to_rfc3339(),
        };
        (next, event)
    }

    /// Drops the socket without producing a presence event. Used when a socket
    /// id is taken over by another user.
    pub fn detached(&self) -> ConnectionUser {
        let mut next = self.clone();
        next.socket_id = None;
        next
    }

    /// Describes an outgoing chat message; the connection itself is unchanged.
    pub fn send_message(
        &self,
        message_id: MessageId,
        chat_id: ChatId,
        content: &str,
        now: DateTime<Utc>,
    ) -> DomainEvent {
        DomainEvent::MessageSent {
            message_id: message_id.to_string(),
            chat_id: chat_id.to_string(),
            sender_id: self.user_id.clone(),
            content: content.to_string(),
            timestamp: now.to_rfc3339(),
        }
    }

    pub fn with_role(mut self, role: ConnectionRole) -> Self {
        self.roles.insert(role);
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn socket_id(&self) -> Option<&str> {
        self.socket_id.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.socket_id.is_some()
    }

    pub fn roles(&self) -> &BTreeSet<ConnectionRole> {
        &self.roles
    }

    pub fn has_role(&self, role: ConnectionRole) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_visitor(&self) -> bool {
        self.has_role(ConnectionRole::Visitor)
    }

    pub fn is_commercial(&self) -> bool {
        self.has_role(ConnectionRole::Commercial)
    }

    fn role_list(&self) -> Vec<ConnectionRole> {
        self.roles.iter().copied().collect()
    }
}

/// Equality/membership filter for registry lookups. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionCriteria {
    pub user_id: Option<String>,
    pub socket_id: Option<String>,
    pub role: Option<ConnectionRole>,
    pub connected: Option<bool>,
}

impl ConnectionCriteria {
    pub fn by_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Default::default()
        }
    }

    pub fn by_socket(socket_id: impl Into<String>) -> Self {
        Self {
            socket_id: Some(socket_id.into()),
            ..Default::default()
        }
    }

    pub fn connected_with_role(role: ConnectionRole) -> Self {
        Self {
            role: Some(role),
            connected: Some(true),
            ..Default::default()
        }
    }

    pub fn matches(&self, user: &ConnectionUser) -> bool {
        if let Some(user_id) = &self.user_id {
            if user.user_id() != user_id {
                return false;
            }
        }
        if let Some(socket_id) = &self.socket_id {
            if user.socket_id() != Some(socket_id.as_str()) {
                return false;
            }
        }
        if let Some(role) = self.role {
            if !user.has_role(role) {
                return false;
            }
        }
        if let Some(connected) = self.connected {
            if user.is_connected() != connected {
                return false;
            }
        }
        true
    }
}
