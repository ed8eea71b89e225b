use crate::domain::entities::ids::{ChatId, CommercialId, VisitorId};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::events::DomainEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChatStatus {
    Pending,
    Assigned,
    Active,
    Transferred,
    Abandoned,
    Closed,
}

impl ChatStatus {
    pub fn can_be_assigned(&self) -> bool {
        matches!(self, ChatStatus::Pending)
    }

    pub fn can_be_closed(&self) -> bool {
        matches!(
            self,
            ChatStatus::Pending | ChatStatus::Assigned | ChatStatus::Active | ChatStatus::Transferred
        )
    }

    pub fn can_be_transferred(&self) -> bool {
        matches!(
            self,
            ChatStatus::Assigned | ChatStatus::Active | ChatStatus::Transferred
        )
    }

    /// Statuses in which a commercial must own the chat.
    pub fn requires_commercial(&self) -> bool {
        matches!(
            self,
            ChatStatus::Assigned | ChatStatus::Active | ChatStatus::Transferred
        )
    }

    pub fn accepts_messages(&self) -> bool {
        !matches!(self, ChatStatus::Closed | ChatStatus::Abandoned)
    }
}

impl fmt::Display for ChatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatStatus::Pending => write!(f, "PENDING"),
            ChatStatus::Assigned => write!(f, "ASSIGNED"),
            ChatStatus::Active => write!(f, "ACTIVE"),
            ChatStatus::Transferred => write!(f, "TRANSFERRED"),
            ChatStatus::Abandoned => write!(f, "ABANDONED"),
            ChatStatus::Closed => write!(f, "CLOSED"),
        }
    }
}

impl FromStr for ChatStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ChatStatus::Pending),
            "ASSIGNED" => Ok(ChatStatus::Assigned),
            "ACTIVE" => Ok(ChatStatus::Active),
            "TRANSFERRED" => Ok(ChatStatus::Transferred),
            "ABANDONED" => Ok(ChatStatus::Abandoned),
            "CLOSED" => Ok(ChatStatus::Closed),
            other => Err(DomainError::ValidationError(format!(
                "unknown chat status '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChatPriority {
    Low,
    Medium,
    #[default]
    Normal,
    High,
    Urgent,
}

impl ChatPriority {
    /// Numeric weight. NORMAL and MEDIUM share a weight.
    pub fn weight(&self) -> u8 {
        match self {
            ChatPriority::Low => 1,
            ChatPriority::Medium | ChatPriority::Normal => 2,
            ChatPriority::High => 3,
            ChatPriority::Urgent => 4,
        }
    }
}

impl fmt::Display for ChatPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatPriority::Low => write!(f, "LOW"),
            ChatPriority::Medium => write!(f, "MEDIUM"),
            ChatPriority::Normal => write!(f, "NORMAL"),
            ChatPriority::High => write!(f, "HIGH"),
            ChatPriority::Urgent => write!(f, "URGENT"),
        }
    }
}

impl FromStr for ChatPriority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Ok(ChatPriority::Low),
            "MEDIUM" => Ok(ChatPriority::Medium),
            "NORMAL" => Ok(ChatPriority::Normal),
            "HIGH" => Ok(ChatPriority::High),
            "URGENT" => Ok(ChatPriority::Urgent),
            other => Err(DomainError::ValidationError(format!(
                "unknown chat priority '{}'",
                other
            ))),
        }
    }
}

/// Why a commercial ended up owning a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentReason {
    Auto,
    Manual,
    Transfer,
}

impl fmt::Display for AssignmentReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignmentReason::Auto => write!(f, "auto"),
            AssignmentReason::Manual => write!(f, "manual"),
            AssignmentReason::Transfer => write!(f, "transfer"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisitorInfo {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub additional_data: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMetadata {
    pub department: Option<String>,
    pub company_id: Option<String>,
    pub site_id: Option<String>,
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastMessage {
    pub content: String,
    pub sender_id: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatParticipant {
    pub id: String,
    pub is_visitor: bool,
}

/// Input for opening a chat in the pending queue.
#[derive(Debug, Clone)]
pub struct NewChat {
    pub visitor_id: VisitorId,
    pub visitor_info: VisitorInfo,
    pub available_commercial_ids: Vec<CommercialId>,
    pub priority: Option<ChatPriority>,
    pub metadata: Option<ChatMetadata>,
    pub auto_assign: bool,
}

impl NewChat {
    pub fn new(visitor_id: VisitorId, available_commercial_ids: Vec<CommercialId>) -> Self {
        Self {
            visitor_id,
            visitor_info: VisitorInfo::default(),
            available_commercial_ids,
            priority: None,
            metadata: None,
            auto_assign: false,
        }
    }

    pub fn with_auto_assign(mut self) -> Self {
        self.auto_assign = true;
        self
    }

    pub fn with_priority(mut self, priority: ChatPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_metadata(mut self, metadata: ChatMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_visitor_info(mut self, visitor_info: VisitorInfo) -> Self {
        self.visitor_info = visitor_info;
        self
    }
}

/// Flat persisted form of a [`Chat`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatPrimitives {
    pub id: ChatId,
    pub status: ChatStatus,
    pub priority: ChatPriority,
    pub visitor_id: VisitorId,
    pub assigned_commercial_id: Option<CommercialId>,
    pub available_commercial_ids: Vec<CommercialId>,
    pub total_messages: u32,
    pub last_message: Option<LastMessage>,
    pub first_response_time: Option<DateTime<Utc>>,
    pub response_time_seconds: Option<i64>,
    pub closed_at: Option<DateTime<Utc>>,
    pub closed_reason: Option<String>,
    pub closed_by: Option<String>,
    pub visitor_info: VisitorInfo,
    pub metadata: ChatMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

/// Chat aggregate root.
///
/// Mutations never touch `self`: each returns the next state together with the
/// events it produced. The caller persists the state and publishes the events.
#[derive(Debug, Clone, PartialEq)]
pub struct Chat {
    id: ChatId,
    status: ChatStatus,
    priority: ChatPriority,
    visitor_id: VisitorId,
    assigned_commercial_id: Option<CommercialId>,
    available_commercial_ids: Vec<CommercialId>,
    total_messages: u32,
    last_message: Option<LastMessage>,
    first_response_time: Option<DateTime<Utc>>,
    response_time_seconds: Option<i64>,
    closed_at: Option<DateTime<Utc>>,
    closed_reason: Option<String>,
    closed_by: Option<String>,
    visitor_info: VisitorInfo,
    metadata: ChatMetadata,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i32,
}

impl Chat {
    pub fn create_pending(
        input: NewChat,
        now: DateTime<Utc>,
    ) -> DomainResult<(Chat, Vec<DomainEvent>)> {
        if input.auto_assign && input.available_commercial_ids.is_empty() {
            return Err(DomainError::ValidationError(
                "auto-assignment requires at least one available commercial".to_string(),
            ));
        }

        let chat = Chat {
            id: ChatId::new(),
            status: ChatStatus::Pending,
            priority: input.priority.unwrap_or_default(),
            visitor_id: input.visitor_id,
            assigned_commercial_id: None,
            available_commercial_ids: input.available_commercial_ids,
            total_messages: 0,
            last_message: None,
            first_response_time: None,
            response_time_seconds: None,
            closed_at: None,
            closed_reason: None,
            closed_by: None,
            visitor_info: input.visitor_info,
            metadata: input.metadata.unwrap_or_default(),
            created_at: now,
            updated_at: now,
            version: 1,
        };

        let mut events = vec![DomainEvent::ChatCreated {
            chat_id: chat.id.to_string(),
            visitor_id: chat.visitor_id.to_string(),
            status: chat.status,
            priority: chat.priority,
            available_commercial_ids: chat.candidate_ids(),
            department: chat.metadata.department.clone(),
            company_id: chat.metadata.company_id.clone(),
            site_id: chat.metadata.site_id.clone(),
            timestamp: now.to_rfc3339(),
        }];

        if input.auto_assign {
            events.push(chat.request_auto_assignment("chat_created", None, now)?);
        }

        Ok((chat, events))
    }

    /// Asks the orchestrator to pick a commercial for this pending chat.
    pub fn request_auto_assignment(
        &self,
        reason: &str,
        strategy: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<DomainEvent> {
        if !self.status.can_be_assigned() {
            return Err(DomainError::invalid_state(
                "request auto-assignment",
                self.status,
            ));
        }
        if self.available_commercial_ids.is_empty() {
            return Err(DomainError::ValidationError(
                "auto-assignment requires at least one available commercial".to_string(),
            ));
        }

        Ok(DomainEvent::AutoAssignmentRequested {
            chat_id: self.id.to_string(),
            visitor_id: self.visitor_id.to_string(),
            available_commercial_ids: self.candidate_ids(),
            required_skills: self.metadata.required_skills.clone(),
            strategy,
            max_wait_time_seconds: None,
            reason: reason.to_string(),
            company_id: self.metadata.company_id.clone(),
            site_id: self.metadata.site_id.clone(),
            timestamp: now.to_rfc3339(),
        })
    }

    pub fn assign_commercial(
        &self,
        commercial_id: CommercialId,
        reason: AssignmentReason,
        now: DateTime<Utc>,
    ) -> DomainResult<(Chat, Vec<DomainEvent>)> {
        if !self.status.can_be_assigned() {
            return Err(DomainError::invalid_state("assign commercial", self.status));
        }

        let mut next = self.touched(now);
        next.status = ChatStatus::Assigned;
        next.assigned_commercial_id = Some(commercial_id);

        let event = DomainEvent::CommercialAssigned {
            chat_id: next.id.to_string(),
            visitor_id: next.visitor_id.to_string(),
            commercial_id: commercial_id.to_string(),
            previous_commercial_id: None,
            assignment_reason: reason,
            timestamp: now.to_rfc3339(),
        };

        Ok((next, vec![event]))
    }

    pub fn transfer_to(
        &self,
        commercial_id: CommercialId,
        now: DateTime<Utc>,
    ) -> DomainResult<(Chat, Vec<DomainEvent>)> {
        if !self.status.can_be_transferred() {
            return Err(DomainError::invalid_state("transfer", self.status));
        }
        if self.assigned_commercial_id == Some(commercial_id) {
            return Err(DomainError::ValidationError(format!(
                "chat {} is already assigned to {}",
                self.id, commercial_id
            )));
        }

        let previous = self.assigned_commercial_id;
        let mut next = self.touched(now);
        next.status = ChatStatus::Transferred;
        next.assigned_commercial_id = Some(commercial_id);

        let event = DomainEvent::CommercialAssigned {
            chat_id: next.id.to_string(),
            visitor_id: next.visitor_id.to_string(),
            commercial_id: commercial_id.to_string(),
            previous_commercial_id: previous.map(|id| id.to_string()),
            assignment_reason: AssignmentReason::Transfer,
            timestamp: now.to_rfc3339(),
        };

        Ok((next, vec![event]))
    }

    pub fn activate(&self, now: DateTime<Utc>) -> DomainResult<(Chat, Vec<DomainEvent>)> {
        let commercial_id = match (self.status, self.assigned_commercial_id) {
            (ChatStatus::Assigned, Some(id)) => id,
            _ => return Err(DomainError::invalid_state("activate", self.status)),
        };

        let mut next = self.touched(now);
        next.status = ChatStatus::Active;

        let event = DomainEvent::ChatActivated {
            chat_id: next.id.to_string(),
            visitor_id: next.visitor_id.to_string(),
            commercial_id: commercial_id.to_string(),
            timestamp: now.to_rfc3339(),
        };

        Ok((next, vec![event]))
    }

    pub fn abandon(&self, now: DateTime<Utc>) -> DomainResult<(Chat, Vec<DomainEvent>)> {
        if self.status != ChatStatus::Pending {
            return Err(DomainError::invalid_state("abandon", self.status));
        }

        let mut next = self.touched(now);
        next.status = ChatStatus::Abandoned;

        let event = DomainEvent::ChatAbandoned {
            chat_id: next.id.to_string(),
            visitor_id: next.visitor_id.to_string(),
            waited_seconds: next.seconds_since_creation(now),
            timestamp: now.to_rfc3339(),
        };

        Ok((next, vec![event]))
    }

    pub fn close(
        &self,
        closed_by: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<(Chat, Vec<DomainEvent>)> {
        if !self.status.can_be_closed() {
            return Err(DomainError::invalid_state("close", self.status));
        }

        let mut next = self.touched(now);
        next.status = ChatStatus::Closed;
        next.closed_at = Some(now);
        next.closed_reason = Some(reason.to_string());
        next.closed_by = Some(closed_by.to_string());

        let event = DomainEvent::ChatClosed {
            chat_id: next.id.to_string(),
            visitor_id: next.visitor_id.to_string(),
            commercial_id: next.assigned_commercial_id.map(|id| id.to_string()),
            closed_by: closed_by.to_string(),
            reason: reason.to_string(),
            duration_seconds: next.seconds_since_creation(now),
            total_messages: next.total_messages,
            was_closed_by_visitor: next.was_closed_by_visitor(),
            was_closed_by_commercial: next.was_closed_by_commercial(),
            timestamp: now.to_rfc3339(),
        };

        Ok((next, vec![event]))
    }

    /// Counts a message and tracks the first commercial response.
    pub fn record_message(
        &self,
        sender_id: &str,
        content: &str,
        sent_at: DateTime<Utc>,
    ) -> DomainResult<Chat> {
        if !self.status.accepts_messages() {
            return Err(DomainError::invalid_state("record message", self.status));
        }

        let mut next = self.touched(sent_at);
        next.total_messages += 1;
        next.last_message = Some(LastMessage {
            content: content.to_string(),
            sender_id: sender_id.to_string(),
            date: sent_at,
        });

        let from_commercial = next
            .assigned_commercial_id
            .map(|id| id.to_string() == sender_id)
            .unwrap_or(false);
        if from_commercial && next.first_response_time.is_none() {
            next.first_response_time = Some(sent_at);
            next.response_time_seconds = Some(next.seconds_since_creation(sent_at));
        }

        Ok(next)
    }

    /// Visitor plus the owning commercial, if any.
    pub fn participants(&self) -> Vec<ChatParticipant> {
        let mut participants = vec![ChatParticipant {
            id: self.visitor_id.to_string(),
            is_visitor: true,
        }];
        if let Some(commercial_id) = self.assigned_commercial_id {
            participants.push(ChatParticipant {
                id: commercial_id.to_string(),
                is_visitor: false,
            });
        }
        participants
    }

    pub fn was_closed_by_visitor(&self) -> bool {
        self.closed_by.as_deref() == Some(self.visitor_id.to_string().as_str())
    }

    pub fn was_closed_by_commercial(&self) -> bool {
        match (&self.closed_by, self.assigned_commercial_id) {
            (Some(closed_by), Some(commercial_id)) => *closed_by == commercial_id.to_string(),
            _ => false,
        }
    }

    /// Seconds between creation and close, for closed chats.
    pub fn duration_seconds(&self) -> Option<i64> {
        self.closed_at.map(|at| self.seconds_since_creation(at))
    }

    pub fn to_primitives(&self) -> ChatPrimitives {
        ChatPrimitives {
            id: self.id,
            status: self.status,
            priority: self.priority,
            visitor_id: self.visitor_id,
            assigned_commercial_id: self.assigned_commercial_id,
            available_commercial_ids: self.available_commercial_ids.clone(),
            total_messages: self.total_messages,
            last_message: self.last_message.clone(),
            first_response_time: self.first_response_time,
            response_time_seconds: self.response_time_seconds,
            closed_at: self.closed_at,
            closed_reason: self.closed_reason.clone(),
            closed_by: self.closed_by.clone(),
            visitor_info: self.visitor_info.clone(),
            metadata: self.metadata.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.version,
        }
    }

    /// Rebuilds an aggregate from storage, rejecting snapshots that break the
    /// ownership invariant.
    pub fn from_primitives(p: ChatPrimitives) -> DomainResult<Chat> {
        if p.status.requires_commercial() && p.assigned_commercial_id.is_none() {
            return Err(DomainError::ValidationError(format!(
                "chat {} is {} without an assigned commercial",
                p.id, p.status
            )));
        }
        if matches!(p.status, ChatStatus::Pending | ChatStatus::Abandoned)
            && p.assigned_commercial_id.is_some()
        {
            return Err(DomainError::ValidationError(format!(
                "chat {} is {} but has an assigned commercial",
                p.id, p.status
            )));
        }

        Ok(Chat {
            id: p.id,
            status: p.status,
            priority: p.priority,
            visitor_id: p.visitor_id,
            assigned_commercial_id: p.assigned_commercial_id,
            available_commercial_ids: p.available_commercial_ids,
            total_messages: p.total_messages,
            last_message: p.last_message,
            first_response_time: p.first_response_time,
            response_time_seconds: p.response_time_seconds,
            closed_at: p.closed_at,
            closed_reason: p.closed_reason,
            closed_by: p.closed_by,
            visitor_info: p.visitor_info,
            metadata: p.metadata,
            created_at: p.created_at,
            updated_at: p.updated_at,
            version: p.version,
        })
    }

    pub fn id(&self) -> ChatId {
        self.id
    }

    pub fn status(&self) -> ChatStatus {
        self.status
    }

    pub fn priority(&self) -> ChatPriority {
        self.priority
    }

    pub fn visitor_id(&self) -> VisitorId {
        self.visitor_id
    }

    pub fn assigned_commercial_id(&self) -> Option<CommercialId> {
        self.assigned_commercial_id
    }

    pub fn available_commercial_ids(&self) -> &[CommercialId] {
        &self.available_commercial_ids
    }

    pub fn total_messages(&self) -> u32 {
        self.total_messages
    }

    pub fn last_message(&self) -> Option<&LastMessage> {
        self.last_message.as_ref()
    }

    pub fn first_response_time(&self) -> Option<DateTime<Utc>> {
        self.first_response_time
    }

    pub fn response_time_seconds(&self) -> Option<i64> {
        self.response_time_seconds
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    pub fn closed_reason(&self) -> Option<&str> {
        self.closed_reason.as_deref()
    }

    pub fn closed_by(&self) -> Option<&str> {
        self.closed_by.as_deref()
    }

    pub fn visitor_info(&self) -> &VisitorInfo {
        &self.visitor_info
    }

    pub fn metadata(&self) -> &ChatMetadata {
        &self.metadata
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    fn touched(&self, now: DateTime<Utc>) -> Chat {
        let mut next = self.clone();
        next.updated_at = now;
        next.version += 1;
        next
    }

    fn seconds_since_creation(&self, at: DateTime<Utc>) -> i64 {
        (at - self.created_at).num_seconds().max(0)
    }

    fn candidate_ids(&self) -> Vec<String> {
        self.available_commercial_ids
            .iter()
            .map(|id| id.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn pending_chat(now: DateTime<Utc>) -> Chat {
        let input = NewChat::new(VisitorId::new(), vec![CommercialId::new()]);
        Chat::create_pending(input, now).unwrap().0
    }

    #[test]
    fn test_create_pending_emits_created_only() {
        let now = Utc::now();
        let input = NewChat::new(VisitorId::new(), vec![CommercialId::new()]);
        let (chat, events) = Chat::create_pending(input, now).unwrap();

        assert_eq!(chat.status(), ChatStatus::Pending);
        assert_eq!(chat.priority(), ChatPriority::Normal);
        assert!(chat.assigned_commercial_id().is_none());
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], DomainEvent::ChatCreated { .. }));
    }

    #[test]
    fn test_create_with_auto_assign_requests_assignment() {
        let input = NewChat::new(VisitorId::new(), vec![CommercialId::new()]).with_auto_assign();
        let (_, events) = Chat::create_pending(input, Utc::now()).unwrap();

        assert_eq!(events.len(), 2);
        match &events[1] {
            DomainEvent::AutoAssignmentRequested { reason, strategy, .. } => {
                assert_eq!(reason, "chat_created");
                assert!(strategy.is_none());
            }
            other => panic!("Unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_auto_assign_without_candidates_fails() {
        let input = NewChat::new(VisitorId::new(), vec![]).with_auto_assign();
        let result = Chat::create_pending(input, Utc::now());
        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }

    #[test]
    fn test_empty_candidates_allowed_without_auto_assign() {
        let input = NewChat::new(VisitorId::new(), vec![]);
        assert!(Chat::create_pending(input, Utc::now()).is_ok());
    }

    #[test]
    fn test_assign_sets_owner_and_bumps_version() {
        let now = Utc::now();
        let chat = pending_chat(now);
        let commercial = CommercialId::new();

        let (assigned, events) = chat
            .assign_commercial(commercial, AssignmentReason::Manual, now)
            .unwrap();

        assert_eq!(assigned.status(), ChatStatus::Assigned);
        assert_eq!(assigned.assigned_commercial_id(), Some(commercial));
        assert_eq!(assigned.version(), chat.version() + 1);
        // original snapshot is untouched
        assert_eq!(chat.status(), ChatStatus::Pending);
        match &events[0] {
            DomainEvent::CommercialAssigned {
                assignment_reason, ..
            } => assert_eq!(*assignment_reason, AssignmentReason::Manual),
            other => panic!("Unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_activate_requires_assigned() {
        let now = Utc::now();
        let chat = pending_chat(now);
        assert!(chat.activate(now).is_err());

        let (assigned, _) = chat
            .assign_commercial(CommercialId::new(), AssignmentReason::Auto, now)
            .unwrap();
        let (active, events) = assigned.activate(now).unwrap();
        assert_eq!(active.status(), ChatStatus::Active);
        assert!(matches!(events[0], DomainEvent::ChatActivated { .. }));
    }

    #[test]
    fn test_transfer_moves_ownership() {
        let now = Utc::now();
        let first = CommercialId::new();
        let second = CommercialId::new();
        let (assigned, _) = pending_chat(now)
            .assign_commercial(first, AssignmentReason::Auto, now)
            .unwrap();

        let (transferred, events) = assigned.transfer_to(second, now).unwrap();
        assert_eq!(transferred.status(), ChatStatus::Transferred);
        assert_eq!(transferred.assigned_commercial_id(), Some(second));
        match &events[0] {
            DomainEvent::CommercialAssigned {
                previous_commercial_id,
                assignment_reason,
                ..
            } => {
                assert_eq!(previous_commercial_id.as_deref(), Some(first.to_string().as_str()));
                assert_eq!(*assignment_reason, AssignmentReason::Transfer);
            }
            other => panic!("Unexpected event {:?}", other),
        }

        assert!(transferred.transfer_to(second, now).is_err());
    }

    #[test]
    fn test_abandon_only_from_pending() {
        let created = Utc::now();
        let chat = pending_chat(created);
        let (abandoned, events) = chat.abandon(created + Duration::seconds(90)).unwrap();

        assert_eq!(abandoned.status(), ChatStatus::Abandoned);
        match &events[0] {
            DomainEvent::ChatAbandoned { waited_seconds, .. } => assert_eq!(*waited_seconds, 90),
            other => panic!("Unexpected event {:?}", other),
        }
        assert!(abandoned.abandon(created).is_err());
        assert!(abandoned.close("system", "cleanup", created).is_err());
    }

    #[test]
    fn test_close_derives_closer_role() {
        let created = Utc::now();
        let commercial = CommercialId::new();
        let (assigned, _) = pending_chat(created)
            .assign_commercial(commercial, AssignmentReason::Auto, created)
            .unwrap();

        let (closed, events) = assigned
            .close(
                &commercial.to_string(),
                "resolved",
                created + Duration::seconds(125),
            )
            .unwrap();

        assert!(closed.was_closed_by_commercial());
        assert!(!closed.was_closed_by_visitor());
        assert_eq!(closed.duration_seconds(), Some(125));
        assert_eq!(closed.assigned_commercial_id(), Some(commercial));
        match &events[0] {
            DomainEvent::ChatClosed {
                duration_seconds,
                was_closed_by_commercial,
                ..
            } => {
                assert_eq!(*duration_seconds, 125);
                assert!(*was_closed_by_commercial);
            }
            other => panic!("Unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_duration_never_negative() {
        let created = Utc::now();
        let chat = pending_chat(created);
        let (closed, _) = chat
            .close("system", "clock skew", created - Duration::seconds(30))
            .unwrap();
        assert_eq!(closed.duration_seconds(), Some(0));
    }

    #[test]
    fn test_record_message_tracks_first_response() {
        let created = Utc::now();
        let commercial = CommercialId::new();
        let chat = pending_chat(created);
        let visitor = chat.visitor_id().to_string();

        let chat = chat.record_message(&visitor, "hello", created).unwrap();
        assert_eq!(chat.total_messages(), 1);
        assert!(chat.first_response_time().is_none());

        let (chat, _) = chat
            .assign_commercial(commercial, AssignmentReason::Auto, created)
            .unwrap();
        let reply_at = created + Duration::seconds(42);
        let chat = chat
            .record_message(&commercial.to_string(), "hi, how can I help?", reply_at)
            .unwrap();

        assert_eq!(chat.total_messages(), 2);
        assert_eq!(chat.first_response_time(), Some(reply_at));
        assert_eq!(chat.response_time_seconds(), Some(42));
        assert_eq!(chat.last_message().unwrap().content, "hi, how can I help?");
    }

    #[test]
    fn test_from_primitives_rejects_broken_ownership() {
        let mut primitives = pending_chat(Utc::now()).to_primitives();
        primitives.status = ChatStatus::Assigned;
        assert!(Chat::from_primitives(primitives.clone()).is_err());

        primitives.status = ChatStatus::Pending;
        primitives.assigned_commercial_id = Some(CommercialId::new());
        assert!(Chat::from_primitives(primitives).is_err());
    }

    #[test]
    fn test_priority_weights() {
        assert_eq!(ChatPriority::Normal.weight(), ChatPriority::Medium.weight());
        assert!(ChatPriority::Urgent.weight() > ChatPriority::High.weight());
        assert_eq!("urgent".parse::<ChatPriority>().unwrap(), ChatPriority::Urgent);
    }
}
