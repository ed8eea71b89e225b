use crate::domain::entities::ids::CommercialId;
use crate::domain::errors::DomainError;
use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStrategy {
    RoundRobin,
    #[default]
    WorkloadBalanced,
    SkillBased,
    Random,
}

impl AssignmentStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStrategy::RoundRobin => "ROUND_ROBIN",
            AssignmentStrategy::WorkloadBalanced => "WORKLOAD_BALANCED",
            AssignmentStrategy::SkillBased => "SKILL_BASED",
            AssignmentStrategy::Random => "RANDOM",
        }
    }

    /// Lenient parse used for externally supplied names: anything unknown
    /// degrades to workload balancing instead of failing the request.
    pub fn parse_or_default(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            tracing::warn!(
                "Unknown assignment strategy '{}', falling back to {}",
                value,
                AssignmentStrategy::WorkloadBalanced
            );
            AssignmentStrategy::WorkloadBalanced
        })
    }
}

impl fmt::Display for AssignmentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssignmentStrategy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "ROUND_ROBIN" => Ok(AssignmentStrategy::RoundRobin),
            "WORKLOAD_BALANCED" => Ok(AssignmentStrategy::WorkloadBalanced),
            "SKILL_BASED" => Ok(AssignmentStrategy::SkillBased),
            "RANDOM" => Ok(AssignmentStrategy::Random),
            _ => Err(DomainError::ValidationError(format!(
                "unknown assignment strategy '{}'",
                s
            ))),
        }
    }
}

/// What the engine should honour when picking a commercial.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentCriteria {
    pub strategy: AssignmentStrategy,
    pub required_skills: Vec<String>,
    pub exclude_commercial_ids: Vec<CommercialId>,
    pub max_wait_time_seconds: Option<u64>,
}

impl AssignmentCriteria {
    pub fn new(strategy: AssignmentStrategy) -> Self {
        Self {
            strategy,
            ..Default::default()
        }
    }

    pub fn with_required_skills(mut self, skills: Vec<String>) -> Self {
        self.required_skills = skills;
        self
    }

    pub fn excluding(mut self, ids: Vec<CommercialId>) -> Self {
        self.exclude_commercial_ids = ids;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentResult {
    pub commercial_id: CommercialId,
    pub strategy: AssignmentStrategy,
    pub reason: String,
    pub score: i64,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingWindow {
    pub day: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl WorkingWindow {
    pub fn new(day: Weekday, start: NaiveTime, end: NaiveTime) -> Self {
        Self { day, start, end }
    }

    /// An overnight window (start after end) opens on `day` and closes on the
    /// following day.
    fn contains(&self, day: Weekday, time: NaiveTime) -> bool {
        if self.start <= self.end {
            return day == self.day && time >= self.start && time < self.end;
        }
        (day == self.day && time >= self.start) || (day == self.day.succ() && time < self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingHours {
    /// IANA timezone name, e.g. "Europe/Madrid".
    pub timezone: String,
    pub schedule: Vec<WorkingWindow>,
}

impl WorkingHours {
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let tz = self.timezone.parse::<chrono_tz::Tz>().unwrap_or_else(|e| {
            tracing::warn!(
                "Invalid working-hours timezone '{}' ({}), evaluating in UTC",
                self.timezone,
                e
            );
            chrono_tz::UTC
        });

        let local = now.with_timezone(&tz);
        let (day, time) = (local.weekday(), local.time());
        self.schedule.iter().any(|w| w.contains(day, time))
    }
}

/// Per-tenant or per-site assignment configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRules {
    pub id: String,
    pub company_id: String,
    pub site_id: Option<String>,
    pub default_strategy: AssignmentStrategy,
    pub fallback_strategy: AssignmentStrategy,
    pub max_chats_per_commercial: Option<u32>,
    pub max_wait_time_seconds: Option<u64>,
    pub working_hours: Option<WorkingHours>,
    #[serde(default)]
    pub skill_priorities: BTreeMap<String, u32>,
    pub is_active: bool,
}

impl AssignmentRules {
    pub fn new(company_id: impl Into<String>, site_id: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            company_id: company_id.into(),
            site_id,
            default_strategy: AssignmentStrategy::WorkloadBalanced,
            fallback_strategy: AssignmentStrategy::Random,
            max_chats_per_commercial: None,
            max_wait_time_seconds: None,
            working_hours: None,
            skill_priorities: BTreeMap::new(),
            is_active: true,
        }
    }

    /// Default strategy while the rule is active and inside working hours,
    /// fallback strategy otherwise. No schedule means always in hours.
    pub fn get_active_strategy(&self, now: DateTime<Utc>) -> AssignmentStrategy {
        if !self.is_active {
            return self.fallback_strategy;
        }
        match &self.working_hours {
            Some(hours) if !hours.contains(now) => self.fallback_strategy,
            _ => self.default_strategy,
        }
    }

    pub fn applies_to(&self, company_id: &str, site_id: Option<&str>) -> bool {
        if self.company_id != company_id {
            return false;
        }
        match (&self.site_id, site_id) {
            (None, _) => true,
            (Some(own), Some(requested)) => own == requested,
            (Some(_), None) => false,
        }
    }

    /// Picks the most specific rule: site-specific beats company-wide.
    pub fn most_specific<'a>(
        rules: &'a [AssignmentRules],
        company_id: &str,
        site_id: Option<&str>,
    ) -> Option<&'a AssignmentRules> {
        let applicable = rules.iter().filter(|r| r.applies_to(company_id, site_id));
        let mut company_wide = None;
        for rule in applicable {
            if rule.site_id.is_some() {
                return Some(rule);
            }
            if company_wide.is_none() {
                company_wide = Some(rule);
            }
        }
        company_wide
    }
}
