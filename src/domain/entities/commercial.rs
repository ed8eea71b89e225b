use crate::domain::entities::ids::CommercialId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Live read projection of a commercial, as reported by the heartbeat source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommercialInfo {
    pub id: CommercialId,
    pub name: String,
    pub is_online: bool,
    pub current_chats: u32,
    pub max_chats: u32,
    #[serde(default)]
    pub skills: Vec<String>,
    pub last_assigned_at: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: u32,
}

impl CommercialInfo {
    pub fn new(id: CommercialId, name: impl Into<String>, max_chats: u32) -> Self {
        Self {
            id,
            name: name.into(),
            is_online: true,
            current_chats: 0,
            max_chats,
            skills: Vec::new(),
            last_assigned_at: None,
            last_activity: None,
            priority: 0,
        }
    }

    pub fn has_capacity(&self) -> bool {
        self.current_chats < self.max_chats
    }

    pub fn has_skill(&self, skill: &str) -> bool {
        self.skills.iter().any(|s| s.eq_ignore_ascii_case(skill))
    }

    pub fn has_all_skills(&self, required: &[String]) -> bool {
        required.iter().all(|skill| self.has_skill(skill))
    }

    pub fn matching_skill_count(&self, required: &[String]) -> usize {
        required.iter().filter(|skill| self.has_skill(skill)).count()
    }
}
