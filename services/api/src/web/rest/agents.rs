//! services/api/src/web/rest/agents.rs
//!
//! Agents are shared personas; any signed-in user can read them. Stats are always
//! the caller's own.

use axum::{
    extract::State,
    http::StatusCode,
    Extension,
};
use chrono::{DateTime, Utc};
use conversa_core::activity::summarize_agent;
use conversa_core::domain::{Agent, AgentDraft, AgentType};
use conversa_core::AgentStats;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::response::{ApiResponse, AppJson, AppPath, HttpError, HttpResult};
use crate::web::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct AgentResponse {
    pub id: Uuid,
    pub name: String,
    #[schema(value_type = String, example = "travel")]
    pub agent_type: AgentType,
    pub description: Option<String>,
    pub voice: Option<String>,
    pub persona: String,
    pub created_at: DateTime<Utc>,
}

impl From<Agent> for AgentResponse {
    fn from(a: Agent) -> Self {
        Self {
            id: a.id,
            name: a.name,
            agent_type: a.agent_type,
            description: a.description,
            voice: a.voice,
            persona: a.persona,
            created_at: a.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AgentRequest {
    pub name: String,
    #[schema(value_type = String, example = "conversation")]
    pub agent_type: AgentType,
    pub description: Option<String>,
    pub voice: Option<String>,
    /// System prompt describing who the agent is.
    pub persona: String,
}

impl TryFrom<AgentRequest> for AgentDraft {
    type Error = HttpError;

    fn try_from(req: AgentRequest) -> Result<Self, Self::Error> {
        let name = req.name.trim();
        let persona = req.persona.trim();
        if name.is_empty() {
            return Err(HttpError::BadRequest("name is required".to_string()));
        }
        if persona.is_empty() {
            return Err(HttpError::BadRequest("persona is required".to_string()));
        }
        Ok(AgentDraft {
            name: name.to_string(),
            agent_type: req.agent_type,
            description: req.description,
            voice: req.voice,
            persona: persona.to_string(),
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AgentStatsResponse {
    pub agent_id: Uuid,
    pub conversation_count: i64,
    pub total_duration_seconds: i64,
    pub total_messages: i64,
    pub total_words: i64,
    pub average_words_per_minute: f64,
}

impl From<AgentStats> for AgentStatsResponse {
    fn from(s: AgentStats) -> Self {
        Self {
            agent_id: s.agent_id,
            conversation_count: s.conversation_count,
            total_duration_seconds: s.total_duration_seconds,
            total_messages: s.total_messages,
            total_words: s.total_words,
            average_words_per_minute: s.average_words_per_minute,
        }
    }
}

#[utoipa::path(
    get,
    path = "/agents",
    tag = "agents",
    responses((status = 200, description = "Agents", body = [AgentResponse])),
    security(("bearer" = []))
)]
pub async fn list_agents_handler(State(state): State<Arc<AppState>>) -> HttpResult<Vec<AgentResponse>> {
    let agents = state.agents.list_agents().await?;
    Ok(ApiResponse::ok(
        "Agents retrieved",
        agents.into_iter().map(Into::into).collect(),
    ))
}

#[utoipa::path(
    post,
    path = "/agents",
    tag = "agents",
    request_body = AgentRequest,
    responses(
        (status = 201, description = "Agent created", body = AgentResponse),
        (status = 400, description = "Invalid request")
    ),
    security(("bearer" = []))
)]
pub async fn create_agent_handler(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<AgentRequest>,
) -> HttpResult<AgentResponse> {
    let agent = state.agents.create_agent(req.try_into()?).await?;
    info!(agent_id = %agent.id, name = %agent.name, "Agent created");
    Ok(ApiResponse::created("Agent created", agent.into()))
}

#[utoipa::path(
    get,
    path = "/agents/{id}",
    tag = "agents",
    params(("id" = Uuid, Path, description = "Agent id")),
    responses(
        (status = 200, description = "Agent", body = AgentResponse),
        (status = 404, description = "Not found")
    ),
    security(("bearer" = []))
)]
pub async fn get_agent_handler(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<Uuid>,
) -> HttpResult<AgentResponse> {
    let agent = state.agents.get_agent(id).await?;
    Ok(ApiResponse::ok("Agent retrieved", agent.into()))
}

#[utoipa::path(
    put,
    path = "/agents/{id}",
    tag = "agents",
    params(("id" = Uuid, Path, description = "Agent id")),
    request_body = AgentRequest,
    responses(
        (status = 200, description = "Agent updated", body = AgentResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Not found")
    ),
    security(("bearer" = []))
)]
pub async fn update_agent_handler(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<AgentRequest>,
) -> HttpResult<AgentResponse> {
    let agent = state.agents.update_agent(id, req.try_into()?).await?;
    Ok(ApiResponse::ok("Agent updated", agent.into()))
}

/// Delete an agent together with its prompts and conversations.
#[utoipa::path(
    delete,
    path = "/agents/{id}",
    tag = "agents",
    params(("id" = Uuid, Path, description = "Agent id")),
    responses(
        (status = 204, description = "Agent deleted"),
        (status = 404, description = "Not found")
    ),
    security(("bearer" = []))
)]
pub async fn delete_agent_handler(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, HttpError> {
    state.agents.delete_agent(id).await?;
    info!(agent_id = %id, "Agent deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// The signed-in user's activity roll-up with one agent.
#[utoipa::path(
    get,
    path = "/agents/{id}/stats",
    tag = "agents",
    params(("id" = Uuid, Path, description = "Agent id")),
    responses(
        (status = 200, description = "Stats", body = AgentStatsResponse),
        (status = 404, description = "Agent not found")
    ),
    security(("bearer" = []))
)]
pub async fn agent_stats_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    AppPath(id): AppPath<Uuid>,
) -> HttpResult<AgentStatsResponse> {
    state.agents.get_agent(id).await?;
    let activity = state.activity.list_agent_activity(user_id, id).await?;
    Ok(ApiResponse::ok(
        "Agent stats retrieved",
        summarize_agent(id, &activity).into(),
    ))
}
