use crate::domain::entities::AssignmentRules;
use crate::domain::errors::DomainResult;
use async_trait::async_trait;

#[async_trait]
pub trait AssignmentRulesRepository: Send + Sync {
    async fn save(&self, rules: &AssignmentRules) -> DomainResult<()>;

    /// All rules (company-wide and site-specific) for a company.
    async fn find_by_company(&self, company_id: &str) -> DomainResult<Vec<AssignmentRules>>;
}
