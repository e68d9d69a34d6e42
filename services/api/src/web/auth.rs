//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: social sign-in, token refresh and logout.

use axum::{extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use conversa_core::domain::{AuthSession, NewUser, SocialProvider, User};
use conversa_core::ports::PortError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::response::{ApiResponse, AppJson, HttpError, HttpResult};
use crate::web::rest::users::UserResponse;
use crate::web::state::AppState;
use crate::web::tokens::RefreshToken;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SocialLoginRequest {
    #[schema(value_type = String, example = "google")]
    pub provider: SocialProvider,
    pub id_token: String,
    pub user_agent: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Serialize, ToSchema)]
pub struct TokenPairResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Opens a new auth session for the user and returns its token pair.
async fn open_session(
    state: &AppState,
    user: User,
    user_agent: Option<String>,
    now: DateTime<Utc>,
) -> Result<TokenPairResponse, HttpError> {
    let session_id = Uuid::new_v4();
    let (refresh, hash) = state.tokens.new_refresh_token(session_id)?;
    state
        .sessions
        .create_session(AuthSession {
            id: session_id,
            user_id: user.id,
            refresh_token_hash: hash,
            user_agent,
            created_at: now,
            expires_at: now + state.config.refresh_token_ttl,
            revoked_at: None,
        })
        .await?;

    Ok(TokenPairResponse {
        access_token: state.tokens.issue_access_token(user.id, session_id)?,
        refresh_token: refresh.encode(),
        expires_in: state.tokens.access_ttl().as_secs(),
        user: UserResponse::from(user),
    })
}

/// Resolves a presented refresh token to its live session, or 401.
async fn authenticate_refresh(
    state: &AppState,
    raw: &str,
    now: DateTime<Utc>,
) -> Result<AuthSession, HttpError> {
    let token = RefreshToken::parse(raw)?;
    let session = match state.sessions.get_session(token.session_id).await {
        Ok(session) => session,
        Err(PortError::NotFound(_)) => return Err(HttpError::Unauthorized),
        Err(e) => return Err(e.into()),
    };
    if !session.is_active(now) {
        return Err(HttpError::Unauthorized);
    }
    state
        .tokens
        .verify_refresh_secret(&token.secret, &session.refresh_token_hash)?;
    Ok(session)
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/social - Sign in (or sign up) with a Google or Apple identity token
#[utoipa::path(
    post,
    path = "/auth/social",
    tag = "auth",
    request_body = SocialLoginRequest,
    responses(
        (status = 200, description = "Signed in", body = TokenPairResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Identity token rejected"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn social_login_handler(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<SocialLoginRequest>,
) -> HttpResult<TokenPairResponse> {
    let identity = state.identity.verify(req.provider, &req.id_token).await?;

    let user = match state
        .users
        .find_by_social(identity.provider, &identity.social_id)
        .await?
    {
        Some(user) => user,
        None => {
            let user = state
                .users
                .create_user(NewUser {
                    provider: identity.provider,
                    social_id: identity.social_id,
                    email: identity.email,
                    display_name: identity.display_name,
                })
                .await?;
            info!(user_id = %user.id, provider = %user.provider, "Created user from social login");
            user
        }
    };

    let now = Utc::now();
    state.users.touch_last_login(user.id, now).await?;
    let user = User {
        last_login_at: Some(now),
        ..user
    };

    let pair = open_session(&state, user, req.user_agent, now).await?;
    Ok(ApiResponse::ok("Signed in", pair))
}

/// POST /auth/refresh - Exchange a refresh token for a new token pair
#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Tokens rotated", body = TokenPairResponse),
        (status = 401, description = "Refresh token invalid, expired or revoked")
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RefreshRequest>,
) -> HttpResult<TokenPairResponse> {
    let now = Utc::now();
    let session = authenticate_refresh(&state, &req.refresh_token, now).await?;

    // The old secret stops working as soon as the new hash is stored.
    let (refresh, hash) = state.tokens.new_refresh_token(session.id)?;
    state
        .sessions
        .rotate_session(session.id, &hash, now + state.config.refresh_token_ttl)
        .await?;

    let user = state.users.get_user(session.user_id).await?;
    let pair = TokenPairResponse {
        access_token: state.tokens.issue_access_token(user.id, session.id)?,
        refresh_token: refresh.encode(),
        expires_in: state.tokens.access_ttl().as_secs(),
        user: UserResponse::from(user),
    };
    Ok(ApiResponse::ok("Tokens refreshed", pair))
}

/// POST /auth/logout - Revoke the session behind a refresh token
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 204, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RefreshRequest>,
) -> Result<StatusCode, HttpError> {
    let now = Utc::now();
    let session = authenticate_refresh(&state, &req.refresh_token, now).await?;
    state.sessions.revoke_session(session.id, now).await?;
    info!(session_id = %session.id, user_id = %session.user_id, "Session revoked");
    Ok(StatusCode::NO_CONTENT)
}
