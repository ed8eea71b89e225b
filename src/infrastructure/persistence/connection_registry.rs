use crate::domain::entities::{ConnectionCriteria, ConnectionUser};
use crate::domain::errors::DomainResult;
use crate::domain::ports::connection_repository::ConnectionRepository;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct RegistryState {
    users: HashMap<String, ConnectionUser>,
    // socket id -> user id
    sockets: HashMap<String, String>,
}

impl RegistryState {
    fn unindex_user(&mut self, user_id: &str) {
        let previous = self
            .users
            .get(user_id)
            .and_then(|u| u.socket_id())
            .map(str::to_string);
        if let Some(socket_id) = previous {
            if self.sockets.get(&socket_id).map(String::as_str) == Some(user_id) {
                self.sockets.remove(&socket_id);
            }
        }
    }

    fn lookup(&self, criteria: &ConnectionCriteria) -> Vec<ConnectionUser> {
        if let Some(socket_id) = &criteria.socket_id {
            return self
                .sockets
                .get(socket_id)
                .and_then(|user_id| self.users.get(user_id))
                .filter(|u| criteria.matches(u))
                .cloned()
                .into_iter()
                .collect();
        }
        if let Some(user_id) = &criteria.user_id {
            return self
                .users
                .get(user_id)
                .filter(|u| criteria.matches(u))
                .cloned()
                .into_iter()
                .collect();
        }
        self.users
            .values()
            .filter(|u| criteria.matches(u))
            .cloned()
            .collect()
    }
}

/// In-memory connection registry. Both indexes live behind one lock so they
/// are always updated together.
#[derive(Clone, Default)]
pub struct InMemoryConnectionRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl InMemoryConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn connected_count(&self) -> usize {
        self.state.read().await.sockets.len()
    }
}

#[async_trait]
impl ConnectionRepository for InMemoryConnectionRegistry {
    async fn save(&self, user: &ConnectionUser) -> DomainResult<()> {
        let mut state = self.state.write().await;
        let user_id = user.user_id().to_string();

        state.unindex_user(&user_id);

        if let Some(socket_id) = user.socket_id() {
            let previous_owner = state.sockets.insert(socket_id.to_string(), user_id.clone());
            if let Some(other) = previous_owner.filter(|other| *other != user_id) {
                // a socket id belongs to exactly one user
                tracing::warn!(
                    "Socket {} moved from user {} to user {}",
                    socket_id,
                    other,
                    user_id
                );
                if let Some(stale) = state.users.get(&other) {
                    let detached = stale.detached();
                    state.users.insert(other, detached);
                }
            }
        }

        state.users.insert(user_id, user.clone());
        Ok(())
    }

    async fn remove(&self, user_id: &str) -> DomainResult<()> {
        let mut state = self.state.write().await;
        state.unindex_user(user_id);
        state.users.remove(user_id);
        Ok(())
    }

    async fn find(&self, criteria: &ConnectionCriteria) -> DomainResult<Vec<ConnectionUser>> {
        Ok(self.state.read().await.lookup(criteria))
    }

    async fn find_one(
        &self,
        criteria: &ConnectionCriteria,
    ) -> DomainResult<Option<ConnectionUser>> {
        Ok(self.state.read().await.lookup(criteria).into_iter().next())
    }
}
