//! services/api/src/web/rest/users.rs

use axum::{extract::State, http::StatusCode, Extension};
use chrono::{DateTime, Utc};
use conversa_core::domain::{User, UserProfile};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::response::{ApiResponse, AppJson, HttpError, HttpResult};
use crate::web::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    #[schema(example = "google")]
    pub provider: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub native_language: Option<String>,
    pub target_language: Option<String>,
    pub proficiency: Option<String>,
    pub age_range: Option<String>,
    pub learning_goals: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            provider: user.provider.to_string(),
            email: user.email,
            display_name: user.display_name,
            native_language: user.profile.native_language,
            target_language: user.profile.target_language,
            proficiency: user.profile.proficiency,
            age_range: user.profile.age_range,
            learning_goals: user.profile.learning_goals,
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }
}

/// Replaces the learner profile. Omitted fields are cleared.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub native_language: Option<String>,
    pub target_language: Option<String>,
    pub proficiency: Option<String>,
    pub age_range: Option<String>,
    #[serde(default)]
    pub learning_goals: Vec<String>,
}

impl From<UpdateProfileRequest> for UserProfile {
    fn from(req: UpdateProfileRequest) -> Self {
        let clean = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Self {
            native_language: clean(req.native_language),
            target_language: clean(req.target_language),
            proficiency: clean(req.proficiency),
            age_range: clean(req.age_range),
            learning_goals: req
                .learning_goals
                .into_iter()
                .map(|g| g.trim().to_string())
                .filter(|g| !g.is_empty())
                .collect(),
        }
    }
}

/// Get the signed-in user.
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "users",
    responses((status = 200, description = "The current user", body = UserResponse)),
    security(("bearer" = []))
)]
pub async fn get_me_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> HttpResult<UserResponse> {
    let user = state.users.get_user(user_id).await?;
    Ok(ApiResponse::ok("User retrieved", user.into()))
}

/// Update the signed-in user's learner profile.
#[utoipa::path(
    put,
    path = "/users/me",
    tag = "users",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 400, description = "Invalid request")
    ),
    security(("bearer" = []))
)]
pub async fn update_me_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    AppJson(req): AppJson<UpdateProfileRequest>,
) -> HttpResult<UserResponse> {
    let user = state.users.update_profile(user_id, req.into()).await?;
    Ok(ApiResponse::ok("Profile updated", user.into()))
}

/// Delete the signed-in user and everything they own.
#[utoipa::path(
    delete,
    path = "/users/me",
    tag = "users",
    responses((status = 204, description = "User deleted")),
    security(("bearer" = []))
)]
pub async fn delete_me_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<StatusCode, HttpError> {
    state.users.delete_user(user_id).await?;
    info!(%user_id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}
