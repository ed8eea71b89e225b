use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Clock and timer seam, so delayed work can be driven deterministically in tests.
#[async_trait]
pub trait TimeService: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}
