use crate::domain::entities::ConnectionRole;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::realtime_transport::RealtimeTransport;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::mpsc::{error::TrySendError, Sender};
use tokio::sync::Mutex;

/// One frame pushed to a socket.
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeEvent {
    pub event: String,
    pub payload: Value,
}

struct SocketEntry {
    sender: Sender<RealtimeEvent>,
    roles: BTreeSet<ConnectionRole>,
}

/// Transport over per-socket mpsc channels; the HTTP layer drains each
/// receiver into a server-sent event stream.
#[derive(Clone, Default)]
pub struct ChannelTransport {
    sockets: Arc<Mutex<HashMap<String, SocketEntry>>>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_socket(
        &self,
        socket_id: &str,
        roles: BTreeSet<ConnectionRole>,
        sender: Sender<RealtimeEvent>,
    ) {
        let mut sockets = self.sockets.lock().await;
        sockets.insert(socket_id.to_string(), SocketEntry { sender, roles });
    }

    pub async fn unregister_socket(&self, socket_id: &str) {
        let mut sockets = self.sockets.lock().await;
        sockets.remove(socket_id);
    }

    pub async fn socket_count(&self) -> usize {
        self.sockets.lock().await.len()
    }
}

// Slow consumers get a delivery failure instead of stalling the emitter.
fn push(sender: &Sender<RealtimeEvent>, frame: RealtimeEvent) -> Result<(), String> {
    sender.try_send(frame).map_err(|e| match e {
        TrySendError::Full(_) => "socket buffer full".to_string(),
        TrySendError::Closed(_) => "socket closed".to_string(),
    })
}

#[async_trait]
impl RealtimeTransport for ChannelTransport {
    async fn emit_to_socket(
        &self,
        socket_id: &str,
        event: &str,
        payload: &Value,
    ) -> DomainResult<()> {
        let sender = {
            let sockets = self.sockets.lock().await;
            sockets.get(socket_id).map(|entry| entry.sender.clone())
        };

        let sender = sender.ok_or_else(|| DomainError::DeliveryFailed {
            recipient: socket_id.to_string(),
            reason: "socket not registered".to_string(),
        })?;

        let frame = RealtimeEvent {
            event: event.to_string(),
            payload: payload.clone(),
        };
        push(&sender, frame).map_err(|reason| DomainError::DeliveryFailed {
            recipient: socket_id.to_string(),
            reason,
        })
    }

    async fn emit_to_role(
        &self,
        role: ConnectionRole,
        event: &str,
        payload: &Value,
    ) -> DomainResult<usize> {
        let targets: Vec<(String, Sender<RealtimeEvent>)> = {
            let sockets = self.sockets.lock().await;
            sockets
                .iter()
                .filter(|(_, entry)| entry.roles.contains(&role))
                .map(|(id, entry)| (id.clone(), entry.sender.clone()))
                .collect()
        };

        let mut delivered = 0;
        for (socket_id, sender) in targets {
            let frame = RealtimeEvent {
                event: event.to_string(),
                payload: payload.clone(),
            };
            match push(&sender, frame) {
                Ok(()) => delivered += 1,
                Err(reason) => {
                    tracing::warn!("Broadcast {} to socket {} failed: {}", event, socket_id, reason)
                }
            }
        }
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn roles(role: ConnectionRole) -> BTreeSet<ConnectionRole> {
        [role].into_iter().collect()
    }

    #[tokio::test]
    async fn test_emit_to_registered_socket() {
        let transport = ChannelTransport::new();
        let (tx, mut rx) = mpsc::channel(10);
        transport
            .register_socket("s1", roles(ConnectionRole::Visitor), tx)
            .await;

        transport
            .emit_to_socket("s1", "chat.commercial_assigned", &json!({"chat_id": "c1"}))
            .await
            .unwrap();

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.event, "chat.commercial_assigned");
        assert_eq!(frame.payload["chat_id"], "c1");
    }

    #[tokio::test]
    async fn test_emit_to_unknown_socket_fails() {
        let transport = ChannelTransport::new();
        let result = transport.emit_to_socket("ghost", "x", &json!({})).await;
        assert!(matches!(result, Err(DomainError::DeliveryFailed { .. })));
    }

    #[tokio::test]
    async fn test_closed_receiver_is_delivery_failure() {
        let transport = ChannelTransport::new();
        let (tx, rx) = mpsc::channel(10);
        transport
            .register_socket("s1", roles(ConnectionRole::Visitor), tx)
            .await;
        drop(rx);

        let result = transport.emit_to_socket("s1", "x", &json!({})).await;
        assert!(matches!(
            result,
            Err(DomainError::DeliveryFailed { ref reason, .. }) if reason == "socket closed"
        ));
    }

    #[tokio::test]
    async fn test_emit_to_role_only_reaches_role() {
        let transport = ChannelTransport::new();
        let (visitor_tx, mut visitor_rx) = mpsc::channel(10);
        let (agent_tx, mut agent_rx) = mpsc::channel(10);
        transport
            .register_socket("v", roles(ConnectionRole::Visitor), visitor_tx)
            .await;
        transport
            .register_socket("a", roles(ConnectionRole::Commercial), agent_tx)
            .await;

        let delivered = transport
            .emit_to_role(ConnectionRole::Commercial, "chat.created", &json!({}))
            .await
            .unwrap();

        assert_eq!(delivered, 1);
        assert_eq!(agent_rx.recv().await.unwrap().event, "chat.created");
        assert!(visitor_rx.try_recv().is_err());

        transport.unregister_socket("a").await;
        assert_eq!(transport.socket_count().await, 1);
    }
}
