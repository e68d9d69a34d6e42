//! services/api/src/web/rest/conversations.rs

use axum::{
    extract::State,
    http::StatusCode,
    Extension,
};
use chrono::{DateTime, Utc};
use conversa_core::domain::Conversation;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::response::{ApiResponse, AppJson, AppPath, HttpError, HttpResult};
use crate::web::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct ConversationResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub agent_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub summary: Option<String>,
    /// Seconds the live session lasted; null until it ends.
    pub duration_seconds: Option<i64>,
}

impl From<Conversation> for ConversationResponse {
    fn from(c: Conversation) -> Self {
        Self {
            id: c.id,
            user_id: c.user_id,
            agent_id: c.agent_id,
            started_at: c.started_at,
            summary: c.summary,
            duration_seconds: c.duration_seconds,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateConversationRequest {
    pub agent_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateConversationRequest {
    pub summary: Option<String>,
}

/// Loads a conversation, treating other users' conversations as missing.
pub(crate) async fn owned_conversation(
    state: &AppState,
    user_id: Uuid,
    conversation_id: Uuid,
) -> Result<Conversation, HttpError> {
    let conversation = state.conversations.get_conversation(conversation_id).await?;
    if conversation.user_id != user_id {
        return Err(HttpError::NotFound(format!(
            "Conversation {} not found",
            conversation_id
        )));
    }
    Ok(conversation)
}

/// Start a conversation with an agent.
#[utoipa::path(
    post,
    path = "/conversations",
    tag = "conversations",
    request_body = CreateConversationRequest,
    responses(
        (status = 201, description = "Conversation created", body = ConversationResponse),
        (status = 404, description = "Agent not found")
    ),
    security(("bearer" = []))
)]
pub async fn create_conversation_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    AppJson(req): AppJson<CreateConversationRequest>,
) -> HttpResult<ConversationResponse> {
    state.agents.get_agent(req.agent_id).await?;
    let conversation = state
        .conversations
        .create_conversation(user_id, req.agent_id)
        .await?;
    Ok(ApiResponse::created("Conversation created", conversation.into()))
}

/// List the signed-in user's conversations.
#[utoipa::path(
    get,
    path = "/conversations",
    tag = "conversations",
    responses((status = 200, description = "Conversations", body = [ConversationResponse])),
    security(("bearer" = []))
)]
pub async fn list_conversations_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> HttpResult<Vec<ConversationResponse>> {
    let conversations = state.conversations.list_conversations(user_id).await?;
    Ok(ApiResponse::ok(
        "Conversations retrieved",
        conversations.into_iter().map(Into::into).collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/conversations/{id}",
    tag = "conversations",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Conversation", body = ConversationResponse),
        (status = 404, description = "Not found")
    ),
    security(("bearer" = []))
)]
pub async fn get_conversation_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    AppPath(id): AppPath<Uuid>,
) -> HttpResult<ConversationResponse> {
    let conversation = owned_conversation(&state, user_id, id).await?;
    Ok(ApiResponse::ok("Conversation retrieved", conversation.into()))
}

/// Set or clear the conversation summary.
#[utoipa::path(
    put,
    path = "/conversations/{id}",
    tag = "conversations",
    params(("id" = Uuid, Path, description = "Conversation id")),
    request_body = UpdateConversationRequest,
    responses(
        (status = 200, description = "Conversation updated", body = ConversationResponse),
        (status = 404, description = "Not found")
    ),
    security(("bearer" = []))
)]
pub async fn update_conversation_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdateConversationRequest>,
) -> HttpResult<ConversationResponse> {
    owned_conversation(&state, user_id, id).await?;
    let summary = req.summary.filter(|s| !s.trim().is_empty());
    let conversation = state.conversations.update_summary(id, summary).await?;
    Ok(ApiResponse::ok("Conversation updated", conversation.into()))
}

#[utoipa::path(
    delete,
    path = "/conversations/{id}",
    tag = "conversations",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 204, description = "Conversation deleted"),
        (status = 404, description = "Not found")
    ),
    security(("bearer" = []))
)]
pub async fn delete_conversation_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, HttpError> {
    owned_conversation(&state, user_id, id).await?;
    state.conversations.delete_conversation(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
