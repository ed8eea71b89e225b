use crate::domain::entities::{ConnectionCriteria, ConnectionRole, ConnectionUser};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::events::DomainEvent;
use crate::domain::ports::connection_repository::ConnectionRepository;
use crate::domain::ports::event_bus::EventBus;
use crate::domain::ports::time_service::TimeService;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

type UserLocks = Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>;

/// Transport lifecycle on top of the connection registry.
///
/// Updates for the same user id are serialized, so a connect racing a
/// disconnect can never resurrect a stale socket mapping.
#[derive(Clone)]
pub struct ConnectionService {
    registry: Arc<dyn ConnectionRepository>,
    event_bus: Arc<dyn EventBus>,
    time_service: Arc<dyn TimeService>,
    user_locks: UserLocks,
}

impl ConnectionService {
    pub fn new(
        registry: Arc<dyn ConnectionRepository>,
        event_bus: Arc<dyn EventBus>,
        time_service: Arc<dyn TimeService>,
    ) -> Self {
        Self {
            registry,
            event_bus,
            time_service,
            user_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn on_connect(
        &self,
        user_id: &str,
        socket_id: &str,
        roles: Vec<ConnectionRole>,
    ) -> DomainResult<ConnectionUser> {
        if user_id.trim().is_empty() || socket_id.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "user id and socket id are required".to_string(),
            ));
        }

        let lock = self.lock_for(user_id).await;
        let result = {
            let _guard = lock.lock().await;

            let existing = self
                .registry
                .find_one(&ConnectionCriteria::by_user(user_id))
                .await?;

            let base = match existing {
                Some(previous) => {
                    if let Some(old_socket) = previous.socket_id() {
                        if old_socket != socket_id {
                            tracing::info!(
                                "User {} reconnected, socket {} superseded by {}",
                                user_id,
                                old_socket,
                                socket_id
                            );
                        }
                    }
                    roles
                        .into_iter()
                        .fold(previous, |user, role| user.with_role(role))
                }
                None => ConnectionUser::new(user_id, roles),
            };

            let (user, event) = base.connect(socket_id, self.time_service.now());
            self.registry.save(&user).await?;
            self.publish(event);
            Ok(user)
        };
        self.release_lock(user_id, lock).await;

        if result.is_ok() {
            self.report_connections().await;
            tracing::info!("User {} connected on socket {}", user_id, socket_id);
        }
        result
    }

    /// Returns the disconnected user, or `None` when the socket is unknown or
    /// already superseded by a newer connection.
    pub async fn on_disconnect(&self, socket_id: &str) -> DomainResult<Option<ConnectionUser>> {
        let owner = self
            .registry
            .find_one(&ConnectionCriteria::by_socket(socket_id))
            .await?;

        let user_id = match owner {
            Some(user) => user.user_id().to_string(),
            None => {
                tracing::debug!("Disconnect for unknown socket {}, ignoring", socket_id);
                return Ok(None);
            }
        };

        let lock = self.lock_for(&user_id).await;
        let result = {
            let _guard = lock.lock().await;

            // Re-read under the lock: a reconnect may have won the race.
            let current = self
                .registry
                .find_one(&ConnectionCriteria::by_user(user_id.as_str()))
                .await?;

            match current {
                Some(user) if user.socket_id() == Some(socket_id) => {
                    let (user, event) = user.disconnect(self.time_service.now());
                    self.registry.save(&user).await?;
                    self.publish(event);
                    Ok(Some(user))
                }
                _ => {
                    tracing::debug!(
                        "Socket {} no longer belongs to user {}, ignoring disconnect",
                        socket_id,
                        user_id
                    );
                    Ok(None)
                }
            }
        };
        self.release_lock(&user_id, lock).await;

        if let Ok(Some(_)) = &result {
            self.report_connections().await;
            tracing::info!("User {} disconnected from socket {}", user_id, socket_id);
        }
        result
    }

    pub async fn find_user(&self, user_id: &str) -> DomainResult<Option<ConnectionUser>> {
        self.registry
            .find_one(&ConnectionCriteria::by_user(user_id))
            .await
    }

    pub async fn connected_with_role(&self, role: ConnectionRole) -> DomainResult<Vec<ConnectionUser>> {
        self.registry
            .find(&ConnectionCriteria::connected_with_role(role))
            .await
    }

    async fn lock_for(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // The map holds one reference and the caller another; anything more means
    // someone else is waiting on this user.
    async fn release_lock(&self, user_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.user_locks.lock().await;
        if Arc::strong_count(&lock) <= 2 {
            locks.remove(user_id);
        }
    }

    fn publish(&self, event: DomainEvent) {
        if let Err(e) = self.event_bus.publish(event) {
            tracing::warn!("Failed to publish presence event: {}", e);
        }
    }

    async fn report_connections(&self) {
        let criteria = ConnectionCriteria {
            connected: Some(true),
            ..Default::default()
        };
        match self.registry.find(&criteria).await {
            Ok(users) => metrics::gauge!("realtime_connections").set(users.len() as f64),
            Err(e) => tracing::debug!("Could not count connections: {}", e),
        }
    }
}
