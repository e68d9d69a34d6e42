//! services/api/src/web/router.rs
//!
//! Assembles every route, the auth layer and the shared middleware into one router.

use crate::config::ConfigError;
use crate::web::{
    auth::{logout_handler, refresh_handler, social_login_handler},
    middleware::require_auth,
    relay::ws_handler,
    rest::{
        agents, conversations, daily_activity, files, health_handler, messages, progress, prompts,
        sessions, users, ApiDoc,
    },
    state::AppState,
};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Uploads (recorded audio) are capped at this size.
const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

pub fn build_router(app_state: Arc<AppState>) -> Result<Router, ConfigError> {
    let origin = app_state
        .config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|_| {
            ConfigError::InvalidValue(
                "CORS_ORIGIN".to_string(),
                format!("'{}' is not a valid origin", app_state.config.cors_origin),
            )
        })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/auth/social", post(social_login_handler))
        .route("/auth/refresh", post(refresh_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/files/{name}", get(files::download_file_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route(
            "/users/me",
            get(users::get_me_handler)
                .put(users::update_me_handler)
                .delete(users::delete_me_handler),
        )
        .route(
            "/conversations",
            get(conversations::list_conversations_handler)
                .post(conversations::create_conversation_handler),
        )
        .route(
            "/conversations/{id}",
            get(conversations::get_conversation_handler)
                .put(conversations::update_conversation_handler)
                .delete(conversations::delete_conversation_handler),
        )
        .route(
            "/conversations/{id}/messages",
            get(messages::list_messages_handler),
        )
        .route("/messages", post(messages::create_message_handler))
        .route("/messages/{id}", get(messages::get_message_handler))
        .route(
            "/messages/{id}/correction",
            put(messages::correct_message_handler),
        )
        .route("/progress", get(progress::get_progress_handler))
        .route(
            "/agents",
            get(agents::list_agents_handler).post(agents::create_agent_handler),
        )
        .route(
            "/agents/{id}",
            get(agents::get_agent_handler)
                .put(agents::update_agent_handler)
                .delete(agents::delete_agent_handler),
        )
        .route("/agents/{id}/stats", get(agents::agent_stats_handler))
        .route("/agents/{id}/prompts", get(prompts::list_prompts_handler))
        .route("/prompts", post(prompts::create_prompt_handler))
        .route(
            "/prompts/{id}",
            get(prompts::get_prompt_handler)
                .put(prompts::update_prompt_handler)
                .delete(prompts::delete_prompt_handler),
        )
        .route("/sessions", get(sessions::list_sessions_handler))
        .route(
            "/sessions/{id}",
            axum::routing::delete(sessions::revoke_session_handler),
        )
        .route("/files", post(files::upload_file_handler))
        .route("/files/speech", post(files::speech_handler))
        .route(
            "/daily-activity",
            get(daily_activity::list_daily_activity_handler),
        )
        .route(
            "/daily-activity/week",
            get(daily_activity::weekly_report_handler),
        )
        .route("/ws", get(ws_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    Ok(Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())))
}
