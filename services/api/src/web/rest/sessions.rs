//! services/api/src/web/rest/sessions.rs
//!
//! Lets a user see where they are signed in and revoke a device.

use axum::{
    extract::State,
    http::StatusCode,
    Extension,
};
use chrono::{DateTime, Utc};
use conversa_core::domain::AuthSession;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::response::{ApiResponse, AppPath, HttpError, HttpResult};
use crate::web::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub id: Uuid,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<AuthSession> for SessionResponse {
    fn from(s: AuthSession) -> Self {
        Self {
            id: s.id,
            user_agent: s.user_agent,
            created_at: s.created_at,
            expires_at: s.expires_at,
        }
    }
}

/// List the signed-in user's unrevoked, unexpired sessions.
#[utoipa::path(
    get,
    path = "/sessions",
    tag = "sessions",
    responses((status = 200, description = "Active sessions", body = [SessionResponse])),
    security(("bearer" = []))
)]
pub async fn list_sessions_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> HttpResult<Vec<SessionResponse>> {
    let sessions = state
        .sessions
        .list_active_sessions(user_id, Utc::now())
        .await?;
    Ok(ApiResponse::ok(
        "Sessions retrieved",
        sessions.into_iter().map(Into::into).collect(),
    ))
}

/// Revoke one of the signed-in user's sessions.
#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 204, description = "Session revoked"),
        (status = 404, description = "Not found")
    ),
    security(("bearer" = []))
)]
pub async fn revoke_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, HttpError> {
    let session = state.sessions.get_session(id).await?;
    if session.user_id != user_id {
        return Err(HttpError::NotFound(format!("Session {} not found", id)));
    }
    state.sessions.revoke_session(id, Utc::now()).await?;
    info!(session_id = %id, %user_id, "Session revoked");
    Ok(StatusCode::NO_CONTENT)
}
