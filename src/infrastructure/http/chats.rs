use crate::domain::entities::{
    ChatId, ChatMessage, ChatMetadata, ChatPrimitives, ChatPriority, CommercialId, NewChat,
    VisitorId, VisitorInfo,
};
use crate::infrastructure::http::error::{ApiError, ApiResult};
use crate::infrastructure::http::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

// Request DTOs
#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    #[serde(default)]
    pub visitor_id: Option<String>,
    #[serde(default)]
    pub visitor_info: VisitorInfo,
    #[serde(default)]
    pub available_commercial_ids: Vec<String>,
    #[serde(default)]
    pub priority: Option<ChatPriority>,
    #[serde(default)]
    pub metadata: Option<ChatMetadata>,
    #[serde(default)]
    pub auto_assign: bool,
}

#[derive(Debug, Deserialize)]
pub struct CommercialRequest {
    pub commercial_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CloseChatRequest {
    pub closed_by: String,
    #[serde(default = "default_close_reason")]
    pub reason: String,
}

fn default_close_reason() -> String {
    "closed".to_string()
}

#[derive(Debug, Default, Deserialize)]
pub struct AutoAssignRequest {
    #[serde(default)]
    pub strategy: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub sender_id: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct SweepRequest {
    pub max_wait_seconds: i64,
}

// Response DTOs
#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub message: ChatMessage,
    pub delivered_to: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_error: Option<String>,
}

fn parse_chat_id(raw: &str) -> ApiResult<ChatId> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid chat id '{}'", raw)))
}

fn parse_commercial_id(raw: &str) -> ApiResult<CommercialId> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid commercial id '{}'", raw)))
}

pub async fn create_chat(
    State(state): State<AppState>,
    Json(request): Json<CreateChatRequest>,
) -> ApiResult<impl IntoResponse> {
    let visitor_id = match request.visitor_id.as_deref() {
        Some(raw) => raw
            .parse::<VisitorId>()
            .map_err(|_| ApiError::BadRequest(format!("Invalid visitor id '{}'", raw)))?,
        None => VisitorId::new(),
    };
    let candidates = request
        .available_commercial_ids
        .iter()
        .map(|id| parse_commercial_id(id))
        .collect::<ApiResult<Vec<_>>>()?;

    let mut input = NewChat::new(visitor_id, candidates).with_visitor_info(request.visitor_info);
    if let Some(priority) = request.priority {
        input = input.with_priority(priority);
    }
    if let Some(metadata) = request.metadata {
        input = input.with_metadata(metadata);
    }
    if request.auto_assign {
        input = input.with_auto_assign();
    }

    let chat = state.chat_service.create_pending_chat(input).await?;
    Ok((StatusCode::CREATED, Json(chat.to_primitives())))
}

pub async fn get_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ChatPrimitives>> {
    let chat = state.chat_service.get_chat(&parse_chat_id(&id)?).await?;
    Ok(Json(chat.to_primitives()))
}

pub async fn list_pending(State(state): State<AppState>) -> ApiResult<Json<Vec<ChatPrimitives>>> {
    let chats = state.chat_service.list_pending().await?;
    Ok(Json(chats.iter().map(|c| c.to_primitives()).collect()))
}

pub async fn assign_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CommercialRequest>,
) -> ApiResult<Json<ChatPrimitives>> {
    let chat = state
        .chat_service
        .assign_manually(&parse_chat_id(&id)?, parse_commercial_id(&request.commercial_id)?)
        .await?;
    Ok(Json(chat.to_primitives()))
}

pub async fn transfer_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CommercialRequest>,
) -> ApiResult<Json<ChatPrimitives>> {
    let chat = state
        .chat_service
        .transfer(&parse_chat_id(&id)?, parse_commercial_id(&request.commercial_id)?)
        .await?;
    Ok(Json(chat.to_primitives()))
}

pub async fn activate_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ChatPrimitives>> {
    let chat = state.chat_service.activate(&parse_chat_id(&id)?).await?;
    Ok(Json(chat.to_primitives()))
}

pub async fn close_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CloseChatRequest>,
) -> ApiResult<Json<ChatPrimitives>> {
    let chat = state
        .chat_service
        .close(&parse_chat_id(&id)?, &request.closed_by, &request.reason)
        .await?;
    Ok(Json(chat.to_primitives()))
}

pub async fn abandon_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ChatPrimitives>> {
    let chat = state.chat_service.abandon(&parse_chat_id(&id)?).await?;
    Ok(Json(chat.to_primitives()))
}

pub async fn request_auto_assignment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<AutoAssignRequest>>,
) -> ApiResult<StatusCode> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    state
        .chat_service
        .request_auto_assignment(&parse_chat_id(&id)?, request.strategy)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn abandon_expired(
    State(state): State<AppState>,
    Json(request): Json<SweepRequest>,
) -> ApiResult<Json<Vec<ChatPrimitives>>> {
    if request.max_wait_seconds < 0 {
        return Err(ApiError::BadRequest(
            "max_wait_seconds must be non-negative".to_string(),
        ));
    }
    let chats = state
        .chat_service
        .abandon_expired(chrono::Duration::seconds(request.max_wait_seconds))
        .await?;
    Ok(Json(chats.iter().map(|c| c.to_primitives()).collect()))
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.content.trim().is_empty() {
        return Err(ApiError::BadRequest("Message content is empty".to_string()));
    }

    let receipt = state
        .message_routing
        .dispatch(&parse_chat_id(&id)?, &request.sender_id, &request.content)
        .await?;

    let (delivered_to, delivery_error) = match receipt.delivery {
        Ok(report) => (report.delivered, None),
        Err(e) => (Vec::new(), Some(e.to_string())),
    };

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            message: receipt.message,
            delivered_to,
            delivery_error,
        }),
    ))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    let messages = state.message_routing.history(&parse_chat_id(&id)?).await?;
    Ok(Json(messages))
}
