use crate::domain::entities::{ConnectionCriteria, ConnectionRole};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::connection_repository::ConnectionRepository;
use crate::domain::ports::realtime_transport::RealtimeTransport;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Recipient unknown or offline; presence is best-effort.
    Skipped,
}

/// Result of a fan-out. Failures are collected, never short-circuited.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryReport {
    pub delivered: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<(String, DomainError)>,
}

impl DeliveryReport {
    pub fn delivered_count(&self) -> usize {
        self.delivered.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Pushes payloads to a user's current socket, if any.
#[derive(Clone)]
pub struct PresenceNotifier {
    registry: Arc<dyn ConnectionRepository>,
    transport: Arc<dyn RealtimeTransport>,
}

impl PresenceNotifier {
    pub fn new(
        registry: Arc<dyn ConnectionRepository>,
        transport: Arc<dyn RealtimeTransport>,
    ) -> Self {
        Self {
            registry,
            transport,
        }
    }

    /// Disconnected recipients are a silent no-op. The registry is only read.
    pub async fn notify(
        &self,
        recipient_id: &str,
        payload: &Value,
        event_type: &str,
    ) -> DomainResult<DeliveryOutcome> {
        let user = self
            .registry
            .find_one(&ConnectionCriteria::by_user(recipient_id))
            .await?;

        let socket_id = match user.as_ref().and_then(|u| u.socket_id()) {
            Some(socket_id) => socket_id.to_string(),
            None => {
                tracing::debug!("{} not connected, skipping {}", recipient_id, event_type);
                return Ok(DeliveryOutcome::Skipped);
            }
        };

        match self
            .transport
            .emit_to_socket(&socket_id, event_type, payload)
            .await
        {
            Ok(()) => Ok(DeliveryOutcome::Delivered),
            Err(e) => {
                tracing::warn!("Failed to deliver {} to {}: {}", event_type, recipient_id, e);
                Err(match e {
                    DomainError::DeliveryFailed { reason, .. } => DomainError::DeliveryFailed {
                        recipient: recipient_id.to_string(),
                        reason,
                    },
                    other => other,
                })
            }
        }
    }

    /// Direct delivery when the recipient is connected, otherwise a broadcast
    /// to every socket holding `role`. Returns how many sockets were reached.
    pub async fn notify_or_broadcast(
        &self,
        recipient_id: Option<&str>,
        role: ConnectionRole,
        payload: &Value,
        event_type: &str,
    ) -> DomainResult<usize> {
        if let Some(recipient_id) = recipient_id {
            if self.notify(recipient_id, payload, event_type).await? == DeliveryOutcome::Delivered
            {
                return Ok(1);
            }
        }
        self.transport.emit_to_role(role, event_type, payload).await
    }

    pub async fn notify_many(
        &self,
        recipient_ids: &[String],
        payload: &Value,
        event_type: &str,
    ) -> DeliveryReport {
        let attempts = recipient_ids
            .iter()
            .map(|id| async move { (id.clone(), self.notify(id, payload, event_type).await) });

        let mut report = DeliveryReport::default();
        for (id, result) in join_all(attempts).await {
            match result {
                Ok(DeliveryOutcome::Delivered) => report.delivered.push(id),
                Ok(DeliveryOutcome::Skipped) => report.skipped.push(id),
                Err(e) => report.failed.push((id, e)),
            }
        }
        report
    }
}
