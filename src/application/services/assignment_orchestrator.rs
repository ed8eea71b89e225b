use crate::domain::entities::{
    AssignmentCriteria, AssignmentReason, AssignmentResult, AssignmentRules, AssignmentStrategy,
    ChatId, ChatStatus, CommercialId,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::events::DomainEvent;
use crate::domain::ports::assignment_rules_repository::AssignmentRulesRepository;
use crate::domain::ports::chat_repository::ChatRepository;
use crate::domain::ports::commercial_availability::CommercialAvailability;
use crate::domain::ports::event_bus::EventBus;
use crate::domain::ports::task_spawner::TaskSpawner;
use crate::domain::ports::time_service::TimeService;
use crate::domain::services::AssignmentStrategyEngine;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

pub const FALLBACK_REASON: &str = "fallback_after_failure";

/// Typed view of an `AutoAssignmentRequested` event.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentRequest {
    pub chat_id: ChatId,
    pub available_commercial_ids: Vec<CommercialId>,
    pub required_skills: Vec<String>,
    pub strategy: Option<AssignmentStrategy>,
    pub max_wait_time_seconds: Option<u64>,
    pub reason: String,
    pub company_id: Option<String>,
    pub site_id: Option<String>,
}

impl AssignmentRequest {
    pub fn from_event(event: &DomainEvent) -> DomainResult<Self> {
        let DomainEvent::AutoAssignmentRequested {
            chat_id,
            available_commercial_ids,
            required_skills,
            strategy,
            max_wait_time_seconds,
            reason,
            company_id,
            site_id,
            ..
        } = event
        else {
            return Err(DomainError::ValidationError(format!(
                "{} is not an assignment request",
                event.name()
            )));
        };

        let available_commercial_ids = available_commercial_ids
            .iter()
            .map(|id| id.parse())
            .collect::<DomainResult<Vec<CommercialId>>>()?;

        Ok(Self {
            chat_id: chat_id.parse()?,
            available_commercial_ids,
            required_skills: required_skills.clone(),
            strategy: strategy
                .as_deref()
                .map(AssignmentStrategy::parse_or_default),
            max_wait_time_seconds: *max_wait_time_seconds,
            reason: reason.clone(),
            company_id: company_id.clone(),
            site_id: site_id.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssignmentOutcome {
    Assigned(AssignmentResult),
    /// Primary attempt failed; one delayed RANDOM attempt is queued.
    FallbackScheduled { error: DomainError },
    /// The chat already left PENDING.
    Skipped { status: ChatStatus },
}

/// Request override, then the applicable rules, then workload balancing.
pub fn effective_strategy(
    requested: Option<AssignmentStrategy>,
    rules: Option<&AssignmentRules>,
    now: DateTime<Utc>,
) -> AssignmentStrategy {
    requested
        .or_else(|| rules.map(|r| r.get_active_strategy(now)))
        .unwrap_or_default()
}

/// Turns assignment requests into assignments, with at most one fallback.
#[derive(Clone)]
pub struct AssignmentOrchestrator {
    chat_repo: Arc<dyn ChatRepository>,
    rules_repo: Arc<dyn AssignmentRulesRepository>,
    availability: Arc<dyn CommercialAvailability>,
    event_bus: Arc<dyn EventBus>,
    task_spawner: Arc<dyn TaskSpawner>,
    time_service: Arc<dyn TimeService>,
    engine: AssignmentStrategyEngine,
    fallback_delay: Duration,
}

impl AssignmentOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chat_repo: Arc<dyn ChatRepository>,
        rules_repo: Arc<dyn AssignmentRulesRepository>,
        availability: Arc<dyn CommercialAvailability>,
        event_bus: Arc<dyn EventBus>,
        task_spawner: Arc<dyn TaskSpawner>,
        time_service: Arc<dyn TimeService>,
        fallback_delay: Duration,
    ) -> Self {
        Self {
            chat_repo,
            rules_repo,
            availability,
            event_bus,
            task_spawner,
            time_service,
            engine: AssignmentStrategyEngine::new(),
            fallback_delay,
        }
    }

    pub async fn handle_event(&self, event: &DomainEvent) -> DomainResult<AssignmentOutcome> {
        let request = AssignmentRequest::from_event(event)?;
        Ok(self.handle_request(request).await)
    }

    pub async fn handle_request(&self, request: AssignmentRequest) -> AssignmentOutcome {
        tracing::info!(
            "Auto-assignment requested for chat {} ({}, {} candidates)",
            request.chat_id,
            request.reason,
            request.available_commercial_ids.len()
        );

        match self.attempt(&request, None).await {
            Ok(outcome) => outcome,
            Err(error) => {
                metrics::counter!("chat_assignment_failures_total", "stage" => "primary")
                    .increment(1);
                tracing::warn!(
                    "Assignment of chat {} failed, fallback in {}ms: {}",
                    request.chat_id,
                    self.fallback_delay.as_millis(),
                    error
                );
                self.schedule_fallback(request);
                AssignmentOutcome::FallbackScheduled { error }
            }
        }
    }

    fn schedule_fallback(&self, request: AssignmentRequest) {
        let this = self.clone();
        self.task_spawner.spawn(Box::pin(async move {
            this.time_service.sleep(this.fallback_delay).await;
            this.run_fallback(request).await;
        }));
    }

    // Terminal: a failure here is logged and never rescheduled.
    async fn run_fallback(&self, request: AssignmentRequest) {
        let request = AssignmentRequest {
            reason: FALLBACK_REASON.to_string(),
            ..request
        };

        match self
            .attempt(&request, Some(AssignmentStrategy::Random))
            .await
        {
            Ok(AssignmentOutcome::Assigned(result)) => tracing::info!(
                "Fallback assigned chat {} to {}",
                request.chat_id,
                result.commercial_id
            ),
            Ok(AssignmentOutcome::Skipped { status }) => tracing::debug!(
                "Fallback for chat {} skipped, chat is {}",
                request.chat_id,
                status
            ),
            Ok(AssignmentOutcome::FallbackScheduled { .. }) => {}
            Err(e) => {
                metrics::counter!("chat_assignment_failures_total", "stage" => "fallback")
                    .increment(1);
                tracing::error!(
                    "Fallback assignment for chat {} failed, chat stays pending: {}",
                    request.chat_id,
                    e
                );
            }
        }
    }

    async fn attempt(
        &self,
        request: &AssignmentRequest,
        strategy_override: Option<AssignmentStrategy>,
    ) -> DomainResult<AssignmentOutcome> {
        let now = self.time_service.now();
        let chat = self
            .chat_repo
            .find_by_id(&request.chat_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Chat {} not found", request.chat_id)))?;

        if !chat.status().can_be_assigned() {
            return Ok(AssignmentOutcome::Skipped {
                status: chat.status(),
            });
        }

        let rules = self.resolve_rules(request).await?;
        let strategy = match strategy_override {
            Some(strategy) => strategy,
            None => effective_strategy(request.strategy, rules.as_ref(), now),
        };

        let mut candidates = self
            .availability
            .get_commercials(&request.available_commercial_ids)
            .await?;
        if let Some(cap) = rules.as_ref().and_then(|r| r.max_chats_per_commercial) {
            for candidate in candidates.iter_mut() {
                candidate.max_chats = candidate.max_chats.min(cap);
            }
        }

        let mut criteria =
            AssignmentCriteria::new(strategy).with_required_skills(request.required_skills.clone());
        criteria.max_wait_time_seconds = request
            .max_wait_time_seconds
            .or_else(|| rules.as_ref().and_then(|r| r.max_wait_time_seconds));

        let result = self.engine.select_commercial_at(&candidates, &criteria, now)?;

        let (next, events) = chat.assign_commercial(result.commercial_id, AssignmentReason::Auto, now)?;
        self.chat_repo.update(&next, chat.version()).await?;

        if let Err(e) = self.event_bus.publish_all(events) {
            tracing::warn!("Failed to publish assignment events for chat {}: {}", next.id(), e);
        }
        if let Err(e) = self
            .availability
            .record_assignment(&result.commercial_id, now)
            .await
        {
            tracing::warn!(
                "Could not record assignment for commercial {}: {}",
                result.commercial_id,
                e
            );
        }

        metrics::counter!("chat_assignments_total", "strategy" => strategy.as_str()).increment(1);
        tracing::info!(
            "Chat {} assigned to {} via {} (score {}): {}",
            next.id(),
            result.commercial_id,
            strategy,
            result.score,
            result.reason
        );
        Ok(AssignmentOutcome::Assigned(result))
    }

    async fn resolve_rules(
        &self,
        request: &AssignmentRequest,
    ) -> DomainResult<Option<AssignmentRules>> {
        let Some(company_id) = request.company_id.as_deref() else {
            return Ok(None);
        };
        let rules = self.rules_repo.find_by_company(company_id).await?;
        Ok(AssignmentRules::most_specific(&rules, company_id, request.site_id.as_deref()).cloned())
    }
}
