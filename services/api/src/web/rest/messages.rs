//! services/api/src/web/rest/messages.rs

use axum::{
    extract::State,
    Extension,
};
use chrono::{DateTime, Utc};
use conversa_core::domain::{Message, MessageRole, NewMessage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::conversations::owned_conversation;
use crate::web::response::{ApiResponse, AppJson, AppPath, HttpError, HttpResult};
use crate::web::state::AppState;

/// A message as sent over REST and over the relay socket.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageResponse {
    pub id: Uuid,
    pub conversation_id: Uuid,
    #[schema(value_type = String, example = "user")]
    pub role: MessageRole,
    pub content: String,
    pub audio_url: Option<String>,
    pub corrected_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Message> for MessageResponse {
    fn from(m: Message) -> Self {
        Self {
            id: m.id,
            conversation_id: m.conversation_id,
            role: m.role,
            content: m.content,
            audio_url: m.audio_url,
            corrected_text: m.corrected_text,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateMessageRequest {
    pub conversation_id: Uuid,
    /// Defaults to `user`.
    #[schema(value_type = Option<String>, example = "user")]
    pub role: Option<MessageRole>,
    pub content: String,
    pub audio_url: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CorrectionRequest {
    pub corrected_text: String,
}

/// Loads a message whose conversation belongs to `user_id`.
async fn owned_message(
    state: &AppState,
    user_id: Uuid,
    message_id: Uuid,
) -> Result<Message, HttpError> {
    let message = state.messages.get_message(message_id).await?;
    match owned_conversation(state, user_id, message.conversation_id).await {
        Ok(_) => Ok(message),
        Err(HttpError::NotFound(_)) => Err(HttpError::NotFound(format!(
            "Message {} not found",
            message_id
        ))),
        Err(e) => Err(e),
    }
}

/// List a conversation's messages, oldest first.
#[utoipa::path(
    get,
    path = "/conversations/{id}/messages",
    tag = "messages",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Messages", body = [MessageResponse]),
        (status = 404, description = "Conversation not found")
    ),
    security(("bearer" = []))
)]
pub async fn list_messages_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    AppPath(id): AppPath<Uuid>,
) -> HttpResult<Vec<MessageResponse>> {
    owned_conversation(&state, user_id, id).await?;
    let messages = state.messages.list_messages(id).await?;
    Ok(ApiResponse::ok(
        "Messages retrieved",
        messages.into_iter().map(Into::into).collect(),
    ))
}

#[utoipa::path(
    post,
    path = "/messages",
    tag = "messages",
    request_body = CreateMessageRequest,
    responses(
        (status = 201, description = "Message created", body = MessageResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Conversation not found")
    ),
    security(("bearer" = []))
)]
pub async fn create_message_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    AppJson(req): AppJson<CreateMessageRequest>,
) -> HttpResult<MessageResponse> {
    let content = req.content.trim();
    if content.is_empty() {
        return Err(HttpError::BadRequest("content is required".to_string()));
    }
    owned_conversation(&state, user_id, req.conversation_id).await?;

    let message = state
        .messages
        .create_message(NewMessage {
            conversation_id: req.conversation_id,
            role: req.role.unwrap_or(MessageRole::User),
            content: content.to_string(),
            audio_url: req.audio_url,
        })
        .await?;
    Ok(ApiResponse::created("Message created", message.into()))
}

#[utoipa::path(
    get,
    path = "/messages/{id}",
    tag = "messages",
    params(("id" = Uuid, Path, description = "Message id")),
    responses(
        (status = 200, description = "Message", body = MessageResponse),
        (status = 404, description = "Not found")
    ),
    security(("bearer" = []))
)]
pub async fn get_message_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    AppPath(id): AppPath<Uuid>,
) -> HttpResult<MessageResponse> {
    let message = owned_message(&state, user_id, id).await?;
    Ok(ApiResponse::ok("Message retrieved", message.into()))
}

/// Attach a grammar correction to a message.
#[utoipa::path(
    put,
    path = "/messages/{id}/correction",
    tag = "messages",
    params(("id" = Uuid, Path, description = "Message id")),
    request_body = CorrectionRequest,
    responses(
        (status = 200, description = "Correction stored", body = MessageResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Not found")
    ),
    security(("bearer" = []))
)]
pub async fn correct_message_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<CorrectionRequest>,
) -> HttpResult<MessageResponse> {
    let corrected = req.corrected_text.trim();
    if corrected.is_empty() {
        return Err(HttpError::BadRequest("corrected_text is required".to_string()));
    }
    owned_message(&state, user_id, id).await?;
    let message = state.messages.correct_message(id, corrected).await?;
    Ok(ApiResponse::ok("Correction stored", message.into()))
}
