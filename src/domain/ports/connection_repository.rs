use crate::domain::entities::{ConnectionCriteria, ConnectionUser};
use crate::domain::errors::DomainResult;
use async_trait::async_trait;

/// Registry of realtime connections, keyed by user id with a secondary
/// socket index.
#[async_trait]
pub trait ConnectionRepository: Send + Sync {
    /// Store the user, superseding any previous socket mapping for that user id.
    async fn save(&self, user: &ConnectionUser) -> DomainResult<()>;

    /// Drop the user and its socket mapping. Removing an unknown user is a no-op.
    async fn remove(&self, user_id: &str) -> DomainResult<()>;

    async fn find(&self, criteria: &ConnectionCriteria) -> DomainResult<Vec<ConnectionUser>>;

    /// Lookups by socket id resolve through the socket index.
    async fn find_one(&self, criteria: &ConnectionCriteria)
        -> DomainResult<Option<ConnectionUser>>;
}
