use crate::domain::entities::AssignmentRules;
use crate::domain::errors::DomainResult;
use crate::domain::ports::assignment_rules_repository::AssignmentRulesRepository;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone, Default)]
pub struct InMemoryAssignmentRulesRepository {
    // rules id -> rules
    rules: Arc<Mutex<HashMap<String, AssignmentRules>>>,
}

impl InMemoryAssignmentRulesRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssignmentRulesRepository for InMemoryAssignmentRulesRepository {
    async fn save(&self, rules: &AssignmentRules) -> DomainResult<()> {
        self.rules
            .lock()
            .await
            .insert(rules.id.clone(), rules.clone());
        Ok(())
    }

    async fn find_by_company(&self, company_id: &str) -> DomainResult<Vec<AssignmentRules>> {
        let rules = self.rules.lock().await;
        Ok(rules
            .values()
            .filter(|r| r.company_id == company_id)
            .cloned()
            .collect())
    }
}
