use crate::domain::entities::{AssignmentRules, CommercialId, CommercialInfo};
use crate::domain::ports::commercial_availability::CommercialAvailability;
use crate::infrastructure::http::error::{ApiError, ApiResult};
use crate::infrastructure::http::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RegisterCommercialRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub company_id: String,
    #[serde(default)]
    pub site_ids: Vec<String>,
    #[serde(default = "default_max_chats")]
    pub max_chats: u32,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub priority: u32,
}

fn default_max_chats() -> u32 {
    5
}

#[derive(Debug, Deserialize)]
pub struct AvailableQuery {
    pub company_id: String,
    #[serde(default)]
    pub site_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OnlineRequest {
    pub online: bool,
}

fn parse_id(raw: &str) -> ApiResult<CommercialId> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid commercial id '{}'", raw)))
}

pub async fn register_commercial(
    State(state): State<AppState>,
    Json(request): Json<RegisterCommercialRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.max_chats == 0 {
        return Err(ApiError::BadRequest("max_chats must be positive".to_string()));
    }
    let id = match request.id.as_deref() {
        Some(raw) => parse_id(raw)?,
        None => CommercialId::new(),
    };

    let mut info = CommercialInfo::new(id, request.name, request.max_chats);
    info.skills = request.skills;
    info.priority = request.priority;

    state
        .commercial_presence
        .register(info.clone(), &request.company_id, request.site_ids)
        .await;
    tracing::info!("Commercial {} registered for {}", id, request.company_id);

    Ok((StatusCode::CREATED, Json(info)))
}

pub async fn list_available(
    State(state): State<AppState>,
    Query(query): Query<AvailableQuery>,
) -> ApiResult<Json<Vec<CommercialInfo>>> {
    let commercials = state
        .commercial_presence
        .get_available_commercials(&query.company_id, query.site_id.as_deref())
        .await?;
    Ok(Json(commercials))
}

pub async fn heartbeat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.commercial_presence.record_heartbeat(&parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_online(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<OnlineRequest>,
) -> ApiResult<StatusCode> {
    state
        .commercial_presence
        .set_online(&parse_id(&id)?, request.online)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn save_rules(
    State(state): State<AppState>,
    Json(rules): Json<AssignmentRules>,
) -> ApiResult<Json<AssignmentRules>> {
    state.rules_repo.save(&rules).await?;
    tracing::info!(
        "Assignment rules {} saved for company {} (site {:?})",
        rules.id,
        rules.company_id,
        rules.site_id
    );
    Ok(Json(rules))
}

pub async fn list_rules(
    State(state): State<AppState>,
    Path(company_id): Path<String>,
) -> ApiResult<Json<Vec<AssignmentRules>>> {
    Ok(Json(state.rules_repo.find_by_company(&company_id).await?))
}
