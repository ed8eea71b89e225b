use crate::domain::entities::{CommercialId, CommercialInfo};
use crate::domain::errors::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Heartbeat/presence source for commercials. Owns online state and workload.
#[async_trait]
pub trait CommercialAvailability: Send + Sync {
    /// Online commercials serving a company, optionally narrowed to a site.
    async fn get_available_commercials(
        &self,
        company_id: &str,
        site_id: Option<&str>,
    ) -> DomainResult<Vec<CommercialInfo>>;

    /// Live info for the given ids, in the same order. Unknown ids are skipped.
    async fn get_commercials(&self, ids: &[CommercialId]) -> DomainResult<Vec<CommercialInfo>>;

    async fn is_commercial_available(&self, id: &CommercialId) -> DomainResult<bool>;

    async fn record_heartbeat(&self, id: &CommercialId) -> DomainResult<()>;

    /// Going online also counts as a heartbeat.
    async fn set_online(&self, id: &CommercialId, online: bool) -> DomainResult<()>;

    /// Feed an assignment back: bumps current chats and last-assigned time.
    async fn record_assignment(&self, id: &CommercialId, at: DateTime<Utc>) -> DomainResult<()>;

    /// A chat owned by this commercial ended.
    async fn release_chat(&self, id: &CommercialId) -> DomainResult<()>;
}
