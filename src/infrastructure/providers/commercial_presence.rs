use crate::domain::entities::{CommercialId, CommercialInfo};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::commercial_availability::CommercialAvailability;
use crate::domain::ports::time_service::TimeService;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

struct CommercialRecord {
    info: CommercialInfo,
    company_id: String,
    // empty means every site of the company
    site_ids: Vec<String>,
    last_heartbeat: Option<DateTime<Utc>>,
}

impl CommercialRecord {
    fn serves(&self, company_id: &str, site_id: Option<&str>) -> bool {
        if self.company_id != company_id {
            return false;
        }
        match site_id {
            Some(site) if !self.site_ids.is_empty() => self.site_ids.iter().any(|s| s == site),
            _ => true,
        }
    }

    fn snapshot(&self, now: DateTime<Utc>, timeout: Duration) -> CommercialInfo {
        let fresh = self
            .last_heartbeat
            .map(|at| now - at <= timeout)
            .unwrap_or(false);

        let mut info = self.info.clone();
        info.is_online = self.info.is_online && fresh;
        info.last_activity = self.last_heartbeat;
        info
    }
}

/// Heartbeat-driven availability registry. A commercial counts as online while
/// flagged online and heard from within the heartbeat timeout.
#[derive(Clone)]
pub struct InMemoryCommercialPresence {
    records: Arc<RwLock<HashMap<CommercialId, CommercialRecord>>>,
    heartbeat_timeout: Duration,
    time_service: Arc<dyn TimeService>,
}

impl InMemoryCommercialPresence {
    pub fn new(heartbeat_timeout: Duration, time_service: Arc<dyn TimeService>) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            heartbeat_timeout,
            time_service,
        }
    }

    /// Add or replace a commercial. Online commercials start with a fresh heartbeat.
    pub async fn register(&self, info: CommercialInfo, company_id: &str, site_ids: Vec<String>) {
        let last_heartbeat = info.is_online.then(|| self.time_service.now());
        tracing::debug!("Registering commercial {} for company {}", info.id, company_id);
        self.records.write().await.insert(
            info.id,
            CommercialRecord {
                info,
                company_id: company_id.to_string(),
                site_ids,
                last_heartbeat,
            },
        );
    }
}

fn not_found(id: &CommercialId) -> DomainError {
    DomainError::NotFound(format!("Commercial {} not found", id))
}

#[async_trait]
impl CommercialAvailability for InMemoryCommercialPresence {
    async fn get_available_commercials(
        &self,
        company_id: &str,
        site_id: Option<&str>,
    ) -> DomainResult<Vec<CommercialInfo>> {
        let now = self.time_service.now();
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.serves(company_id, site_id))
            .map(|r| r.snapshot(now, self.heartbeat_timeout))
            .filter(|info| info.is_online)
            .collect())
    }

    async fn get_commercials(&self, ids: &[CommercialId]) -> DomainResult<Vec<CommercialInfo>> {
        let now = self.time_service.now();
        let records = self.records.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| records.get(id))
            .map(|r| r.snapshot(now, self.heartbeat_timeout))
            .collect())
    }

    async fn is_commercial_available(&self, id: &CommercialId) -> DomainResult<bool> {
        let now = self.time_service.now();
        let records = self.records.read().await;
        Ok(records
            .get(id)
            .map(|r| r.snapshot(now, self.heartbeat_timeout))
            .map(|info| info.is_online && info.has_capacity())
            .unwrap_or(false))
    }

    async fn record_heartbeat(&self, id: &CommercialId) -> DomainResult<()> {
        let now = self.time_service.now();
        let mut records = self.records.write().await;
        let record = records.get_mut(id).ok_or_else(|| not_found(id))?;
        record.last_heartbeat = Some(now);
        Ok(())
    }

    async fn set_online(&self, id: &CommercialId, online: bool) -> DomainResult<()> {
        let now = self.time_service.now();
        let mut records = self.records.write().await;
        let record = records.get_mut(id).ok_or_else(|| not_found(id))?;
        record.info.is_online = online;
        if online {
            record.last_heartbeat = Some(now);
        }
        Ok(())
    }

    async fn record_assignment(&self, id: &CommercialId, at: DateTime<Utc>) -> DomainResult<()> {
        let mut records = self.records.write().await;
        let record = records.get_mut(id).ok_or_else(|| not_found(id))?;
        record.info.current_chats += 1;
        record.info.last_assigned_at = Some(at);
        Ok(())
    }

    async fn release_chat(&self, id: &CommercialId) -> DomainResult<()> {
        let mut records = self.records.write().await;
        let record = records.get_mut(id).ok_or_else(|| not_found(id))?;
        if record.info.current_chats == 0 {
            tracing::warn!("Commercial {} released a chat it was not charged for", id);
            return Ok(());
        }
        record.info.current_chats -= 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FixedClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl FixedClock {
        fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    #[async_trait]
    impl TimeService for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }

        async fn sleep(&self, _duration: std::time::Duration) {}
    }

    fn presence() -> (InMemoryCommercialPresence, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock {
            now: Mutex::new(Utc::now()),
        });
        (
            InMemoryCommercialPresence::new(Duration::seconds(60), clock.clone()),
            clock,
        )
    }

    #[tokio::test]
    async fn test_heartbeat_timeout_marks_offline() {
        let (presence, clock) = presence();
        let info = CommercialInfo::new(CommercialId::new(), "Ana", 3);
        let id = info.id;
        presence.register(info, "acme", vec![]).await;

        assert!(presence.is_commercial_available(&id).await.unwrap());

        clock.advance(Duration::seconds(61));
        assert!(!presence.is_commercial_available(&id).await.unwrap());

        presence.record_heartbeat(&id).await.unwrap();
        assert!(presence.is_commercial_available(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_available_commercials_by_site() {
        let (presence, _) = presence();
        let everywhere = CommercialInfo::new(CommercialId::new(), "Ana", 3);
        let site_one = CommercialInfo::new(CommercialId::new(), "Luis", 3);
        let mut offline = CommercialInfo::new(CommercialId::new(), "Eva", 3);
        offline.is_online = false;

        presence.register(everywhere.clone(), "acme", vec![]).await;
        presence
            .register(site_one.clone(), "acme", vec!["site-1".to_string()])
            .await;
        presence.register(offline, "acme", vec![]).await;

        let on_site_two = presence
            .get_available_commercials("acme", Some("site-2"))
            .await
            .unwrap();
        assert_eq!(on_site_two.len(), 1);
        assert_eq!(on_site_two[0].id, everywhere.id);

        let on_site_one = presence
            .get_available_commercials("acme", Some("site-1"))
            .await
            .unwrap();
        assert_eq!(on_site_one.len(), 2);

        assert!(presence
            .get_available_commercials("globex", None)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_assignment_feedback_updates_workload() {
        let (presence, clock) = presence();
        let info = CommercialInfo::new(CommercialId::new(), "Ana", 1);
        let id = info.id;
        presence.register(info, "acme", vec![]).await;

        presence.record_assignment(&id, clock.now()).await.unwrap();
        let snapshot = presence.get_commercials(&[id]).await.unwrap();
        assert_eq!(snapshot[0].current_chats, 1);
        assert_eq!(snapshot[0].last_assigned_at, Some(clock.now()));
        assert!(!presence.is_commercial_available(&id).await.unwrap());

        presence.release_chat(&id).await.unwrap();
        presence.release_chat(&id).await.unwrap();
        let snapshot = presence.get_commercials(&[id]).await.unwrap();
        assert_eq!(snapshot[0].current_chats, 0);
    }

    #[tokio::test]
    async fn test_going_offline_hides_commercial_until_back_online() {
        let (presence, clock) = presence();
        let info = CommercialInfo::new(CommercialId::new(), "Ana", 3);
        let id = info.id;
        presence.register(info, "acme", vec![]).await;

        presence.set_online(&id, false).await.unwrap();
        assert!(!presence.is_commercial_available(&id).await.unwrap());
        // a heartbeat alone does not bring it back
        presence.record_heartbeat(&id).await.unwrap();
        assert!(!presence.is_commercial_available(&id).await.unwrap());

        clock.advance(Duration::seconds(120));
        presence.set_online(&id, true).await.unwrap();
        assert!(presence.is_commercial_available(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_commercial_heartbeat_is_not_found() {
        let (presence, _) = presence();
        let result = presence.record_heartbeat(&CommercialId::new()).await;
        assert!(matches!(result, Err(DomainError::NotFound(_))));
        assert!(presence
            .get_commercials(&[CommercialId::new()])
            .await
            .unwrap()
            .is_empty());
    }
}
