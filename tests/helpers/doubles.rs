#![allow(dead_code)]
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use futures::future::BoxFuture;
use oxichat::domain::entities::ConnectionRole;
use oxichat::domain::errors::{DomainError, DomainResult};
use oxichat::domain::ports::realtime_transport::RealtimeTransport;
use oxichat::domain::ports::task_spawner::TaskSpawner;
use oxichat::domain::ports::time_service::TimeService;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Mutex;

/// Clock that only moves when told to. `sleep` returns immediately and is recorded.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<std::time::Duration>>,
}

impl FixedClock {
    pub fn new() -> Self {
        Self::at(Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap())
    }

    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }

    pub fn sleeps(&self) -> Vec<std::time::Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl TimeService for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: std::time::Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Collects spawned futures so a test decides when (and whether) they run.
#[derive(Default)]
pub struct ManualTaskSpawner {
    tasks: Mutex<Vec<BoxFuture<'static, ()>>>,
}

impl ManualTaskSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    /// Runs queued tasks in order, including tasks they queue in turn.
    /// Returns how many ran.
    pub async fn run_all(&self) -> usize {
        let mut ran = 0;
        loop {
            let batch: Vec<_> = std::mem::take(&mut *self.tasks.lock().unwrap());
            if batch.is_empty() {
                return ran;
            }
            for task in batch {
                task.await;
                ran += 1;
            }
        }
    }

    /// Runs only what is queued right now.
    pub async fn run_pending(&self) -> usize {
        let batch: Vec<_> = std::mem::take(&mut *self.tasks.lock().unwrap());
        let count = batch.len();
        for task in batch {
            task.await;
        }
        count
    }
}

impl TaskSpawner for ManualTaskSpawner {
    fn spawn(&self, future: BoxFuture<'static, ()>) {
        self.tasks.lock().unwrap().push(future);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Emitted {
    pub target: String,
    pub event: String,
    pub payload: Value,
}

/// Transport that records every emission. Sockets in `broken` fail delivery.
#[derive(Default)]
pub struct RecordingTransport {
    emitted: Mutex<Vec<Emitted>>,
    broken: Mutex<HashSet<String>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn break_socket(&self, socket_id: &str) {
        self.broken.lock().unwrap().insert(socket_id.to_string());
    }

    pub fn emitted(&self) -> Vec<Emitted> {
        self.emitted.lock().unwrap().clone()
    }

    pub fn emitted_to(&self, target: &str) -> Vec<Emitted> {
        self.emitted()
            .into_iter()
            .filter(|e| e.target == target)
            .collect()
    }
}

#[async_trait]
impl RealtimeTransport for RecordingTransport {
    async fn emit_to_socket(&self, socket_id: &str, event: &str, payload: &Value) -> DomainResult<()> {
        if self.broken.lock().unwrap().contains(socket_id) {
            return Err(DomainError::DeliveryFailed {
                recipient: socket_id.to_string(),
                reason: "socket closed".to_string(),
            });
        }
        self.emitted.lock().unwrap().push(Emitted {
            target: socket_id.to_string(),
            event: event.to_string(),
            payload: payload.clone(),
        });
        Ok(())
    }

    async fn emit_to_role(
        &self,
        role: ConnectionRole,
        event: &str,
        payload: &Value,
    ) -> DomainResult<usize> {
        self.emitted.lock().unwrap().push(Emitted {
            target: format!("role:{}", role),
            event: event.to_string(),
            payload: payload.clone(),
        });
        Ok(1)
    }
}
