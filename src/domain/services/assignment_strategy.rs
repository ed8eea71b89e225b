use crate::domain::entities::{
    AssignmentCriteria, AssignmentResult, AssignmentStrategy, CommercialInfo,
};
use crate::domain::errors::{DomainError, DomainResult};
use chrono::{DateTime, Utc};
use rand::Rng;

const CAPACITY_WEIGHT: f64 = 100.0;
const PRIORITY_WEIGHT: f64 = 10.0;
const SKILL_MATCH_WEIGHT: f64 = 50.0;
const MAX_RECENCY_BONUS: f64 = 20.0;
const RECENCY_MINUTES_PER_POINT: f64 = 10.0;

/// Picks exactly one commercial for a pending chat.
#[derive(Debug, Clone, Default)]
pub struct AssignmentStrategyEngine;

impl AssignmentStrategyEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn select_commercial(
        &self,
        candidates: &[CommercialInfo],
        criteria: &AssignmentCriteria,
    ) -> DomainResult<AssignmentResult> {
        self.select_commercial_at(candidates, criteria, Utc::now())
    }

    pub fn select_commercial_at(
        &self,
        candidates: &[CommercialInfo],
        criteria: &AssignmentCriteria,
        now: DateTime<Utc>,
    ) -> DomainResult<AssignmentResult> {
        self.select_with_rng(candidates, criteria, now, &mut rand::thread_rng())
    }

    pub fn select_with_rng<R: Rng>(
        &self,
        candidates: &[CommercialInfo],
        criteria: &AssignmentCriteria,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> DomainResult<AssignmentResult> {
        let eligible = Self::filter_eligible(candidates, criteria);
        if eligible.is_empty() {
            tracing::debug!(
                "No eligible commercials among {} candidates (required skills: {:?})",
                candidates.len(),
                criteria.required_skills
            );
            return Err(DomainError::NoEligibleCommercials(format!(
                "no eligible commercials among {} candidates",
                candidates.len()
            )));
        }

        let required = &criteria.required_skills;
        let (selected, reason) = match criteria.strategy {
            AssignmentStrategy::RoundRobin => {
                let selected = Self::round_robin(&eligible);
                let reason = match selected.last_assigned_at {
                    Some(at) => format!(
                        "round robin: least recently assigned (last at {})",
                        at.to_rfc3339()
                    ),
                    None => "round robin: never assigned before".to_string(),
                };
                (selected, reason)
            }
            AssignmentStrategy::WorkloadBalanced => {
                let selected = Self::workload_balanced(&eligible);
                let reason = format!(
                    "workload balanced: {}/{} active chats",
                    selected.current_chats, selected.max_chats
                );
                (selected, reason)
            }
            AssignmentStrategy::SkillBased => {
                let (selected, score) = Self::skill_based(&eligible, required, now);
                let reason = format!(
                    "skill based: best score {} ({}/{} required skills)",
                    score,
                    selected.matching_skill_count(required),
                    required.len()
                );
                (selected, reason)
            }
            AssignmentStrategy::Random => {
                let selected = eligible[rng.gen_range(0..eligible.len())];
                let reason = format!("random pick among {} eligible commercials", eligible.len());
                (selected, reason)
            }
        };

        let score = Self::calculate_commercial_score(selected, required, now);

        tracing::debug!(
            "Selected commercial {} via {} (score {}): {}",
            selected.id,
            criteria.strategy,
            score,
            reason
        );

        Ok(AssignmentResult {
            commercial_id: selected.id,
            strategy: criteria.strategy,
            reason,
            score,
            assigned_at: now,
        })
    }

    /// Online, below capacity, not excluded and holding every required skill.
    pub fn filter_eligible<'a>(
        candidates: &'a [CommercialInfo],
        criteria: &AssignmentCriteria,
    ) -> Vec<&'a CommercialInfo> {
        candidates
            .iter()
            .filter(|c| c.is_online)
            .filter(|c| c.has_capacity())
            .filter(|c| !criteria.exclude_commercial_ids.contains(&c.id))
            .filter(|c| c.has_all_skills(&criteria.required_skills))
            .collect()
    }

    /// capacity (0-100) + priority * 10 + skill match (0-50) + recency (0-20),
    /// rounded to the nearest integer. Never-assigned commercials get the full
    /// recency bonus.
    pub fn calculate_commercial_score(
        commercial: &CommercialInfo,
        required_skills: &[String],
        now: DateTime<Utc>,
    ) -> i64 {
        let capacity = if commercial.max_chats == 0 {
            0.0
        } else {
            let free = commercial.max_chats.saturating_sub(commercial.current_chats);
            free as f64 / commercial.max_chats as f64 * CAPACITY_WEIGHT
        };

        let priority = commercial.priority as f64 * PRIORITY_WEIGHT;

        let skills = if required_skills.is_empty() {
            0.0
        } else {
            commercial.matching_skill_count(required_skills) as f64 / required_skills.len() as f64
                * SKILL_MATCH_WEIGHT
        };

        let recency = match commercial.last_assigned_at {
            Some(at) => {
                let minutes = (now - at).num_milliseconds().max(0) as f64 / 60_000.0;
                (minutes / RECENCY_MINUTES_PER_POINT).min(MAX_RECENCY_BONUS)
            }
            None => MAX_RECENCY_BONUS,
        };

        (capacity + priority + skills + recency).round() as i64
    }

    // None orders before Some, so never-assigned wins. Strict comparison keeps
    // the first of equal keys.
    fn round_robin<'a>(eligible: &[&'a CommercialInfo]) -> &'a CommercialInfo {
        let mut selected = eligible[0];
        for candidate in &eligible[1..] {
            if candidate.last_assigned_at < selected.last_assigned_at {
                selected = *candidate;
            }
        }
        selected
    }

    fn workload_balanced<'a>(eligible: &[&'a CommercialInfo]) -> &'a CommercialInfo {
        let mut selected = eligible[0];
        for candidate in &eligible[1..] {
            let fewer_chats = candidate.current_chats < selected.current_chats;
            let same_chats_higher_priority = candidate.current_chats == selected.current_chats
                && candidate.priority > selected.priority;
            if fewer_chats || same_chats_higher_priority {
                selected = *candidate;
            }
        }
        selected
    }

    fn skill_based<'a>(
        eligible: &[&'a CommercialInfo],
        required_skills: &[String],
        now: DateTime<Utc>,
    ) -> (&'a CommercialInfo, i64) {
        let mut selected = eligible[0];
        let mut best = Self::calculate_commercial_score(selected, required_skills, now);
        for candidate in &eligible[1..] {
            let score = Self::calculate_commercial_score(candidate, required_skills, now);
            if score > best {
                selected = *candidate;
                best = score;
            }
        }
        (selected, best)
    }
}
