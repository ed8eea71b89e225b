use crate::domain::entities::ConnectionRole;
use crate::domain::errors::DomainResult;
use async_trait::async_trait;
use serde_json::Value;

/// Outbound side of the realtime transport.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Push to one socket. Fails with `DeliveryFailed` if the socket is gone.
    async fn emit_to_socket(&self, socket_id: &str, event: &str, payload: &Value)
        -> DomainResult<()>;

    /// Push to every socket holding `role`. Returns how many sockets received it.
    async fn emit_to_role(&self, role: ConnectionRole, event: &str, payload: &Value)
        -> DomainResult<usize>;
}
