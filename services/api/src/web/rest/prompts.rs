//! services/api/src/web/rest/prompts.rs

use axum::{
    extract::State,
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use conversa_core::domain::{Prompt, PromptDraft};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::response::{ApiResponse, AppJson, AppPath, HttpError, HttpResult};
use crate::web::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct PromptResponse {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<Prompt> for PromptResponse {
    fn from(p: Prompt) -> Self {
        Self {
            id: p.id,
            agent_id: p.agent_id,
            title: p.title,
            content: p.content,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PromptRequest {
    pub agent_id: Uuid,
    pub title: String,
    pub content: String,
}

impl TryFrom<PromptRequest> for PromptDraft {
    type Error = HttpError;

    fn try_from(req: PromptRequest) -> Result<Self, Self::Error> {
        if req.title.trim().is_empty() || req.content.trim().is_empty() {
            return Err(HttpError::BadRequest(
                "title and content are required".to_string(),
            ));
        }
        Ok(PromptDraft {
            agent_id: req.agent_id,
            title: req.title.trim().to_string(),
            content: req.content.trim().to_string(),
        })
    }
}

/// List an agent's prompts in creation order.
#[utoipa::path(
    get,
    path = "/agents/{id}/prompts",
    tag = "prompts",
    params(("id" = Uuid, Path, description = "Agent id")),
    responses(
        (status = 200, description = "Prompts", body = [PromptResponse]),
        (status = 404, description = "Agent not found")
    ),
    security(("bearer" = []))
)]
pub async fn list_prompts_handler(
    State(state): State<Arc<AppState>>,
    AppPath(agent_id): AppPath<Uuid>,
) -> HttpResult<Vec<PromptResponse>> {
    state.agents.get_agent(agent_id).await?;
    let prompts = state.prompts.list_prompts(agent_id).await?;
    Ok(ApiResponse::ok(
        "Prompts retrieved",
        prompts.into_iter().map(Into::into).collect(),
    ))
}

#[utoipa::path(
    post,
    path = "/prompts",
    tag = "prompts",
    request_body = PromptRequest,
    responses(
        (status = 201, description = "Prompt created", body = PromptResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Agent not found")
    ),
    security(("bearer" = []))
)]
pub async fn create_prompt_handler(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<PromptRequest>,
) -> HttpResult<PromptResponse> {
    let prompt = state.prompts.create_prompt(req.try_into()?).await?;
    Ok(ApiResponse::created("Prompt created", prompt.into()))
}

#[utoipa::path(
    get,
    path = "/prompts/{id}",
    tag = "prompts",
    params(("id" = Uuid, Path, description = "Prompt id")),
    responses(
        (status = 200, description = "Prompt", body = PromptResponse),
        (status = 404, description = "Not found")
    ),
    security(("bearer" = []))
)]
pub async fn get_prompt_handler(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<Uuid>,
) -> HttpResult<PromptResponse> {
    let prompt = state.prompts.get_prompt(id).await?;
    Ok(ApiResponse::ok("Prompt retrieved", prompt.into()))
}

#[utoipa::path(
    put,
    path = "/prompts/{id}",
    tag = "prompts",
    params(("id" = Uuid, Path, description = "Prompt id")),
    request_body = PromptRequest,
    responses(
        (status = 200, description = "Prompt updated", body = PromptResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Not found")
    ),
    security(("bearer" = []))
)]
pub async fn update_prompt_handler(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<PromptRequest>,
) -> HttpResult<PromptResponse> {
    let prompt = state.prompts.update_prompt(id, req.try_into()?).await?;
    Ok(ApiResponse::ok("Prompt updated", prompt.into()))
}

#[utoipa::path(
    delete,
    path = "/prompts/{id}",
    tag = "prompts",
    params(("id" = Uuid, Path, description = "Prompt id")),
    responses(
        (status = 204, description = "Prompt deleted"),
        (status = 404, description = "Not found")
    ),
    security(("bearer" = []))
)]
pub async fn delete_prompt_handler(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, HttpError> {
    state.prompts.delete_prompt(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
