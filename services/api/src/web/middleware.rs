//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Query, Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::web::response::HttpError;
use crate::web::state::AppState;

#[derive(Deserialize)]
struct TokenQuery {
    access_token: Option<String>,
}

/// Pulls the access token from `Authorization: Bearer` or, for WebSocket clients
/// that cannot set headers, from the `access_token` query parameter.
fn access_token(req: &Request) -> Option<String> {
    let from_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string());

    from_header.or_else(|| {
        Query::<TokenQuery>::try_from_uri(req.uri())
            .ok()
            .and_then(|Query(query)| query.access_token)
            .filter(|t| !t.is_empty())
    })
}

/// Middleware that validates the access token and extracts the user_id.
///
/// If valid, inserts the user_id into request extensions for handlers to use.
/// If invalid or missing, returns a 401 envelope.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, HttpError> {
    let token = access_token(&req).ok_or(HttpError::Unauthorized)?;

    let claims = state.tokens.validate_access_token(&token).map_err(|e| {
        debug!("Rejected access token: {}", e);
        HttpError::Unauthorized
    })?;

    req.extensions_mut().insert(claims.sub);
    Ok(next.run(req).await)
}
