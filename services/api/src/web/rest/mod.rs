//! services/api/src/web/rest/mod.rs
//!
//! The REST API handlers, grouped by resource, and the master definition for the
//! OpenAPI specification.

pub mod agents;
pub mod conversations;
pub mod daily_activity;
pub mod files;
pub mod messages;
pub mod progress;
pub mod prompts;
pub mod sessions;
pub mod users;

use crate::web::auth;
use crate::web::response::{ApiResponse, HttpResult};
use serde::Serialize;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        auth::social_login_handler,
        auth::refresh_handler,
        auth::logout_handler,
        users::get_me_handler,
        users::update_me_handler,
        users::delete_me_handler,
        conversations::create_conversation_handler,
        conversations::list_conversations_handler,
        conversations::get_conversation_handler,
        conversations::update_conversation_handler,
        conversations::delete_conversation_handler,
        messages::list_messages_handler,
        messages::create_message_handler,
        messages::get_message_handler,
        messages::correct_message_handler,
        progress::get_progress_handler,
        agents::list_agents_handler,
        agents::create_agent_handler,
        agents::get_agent_handler,
        agents::update_agent_handler,
        agents::delete_agent_handler,
        agents::agent_stats_handler,
        prompts::list_prompts_handler,
        prompts::create_prompt_handler,
        prompts::get_prompt_handler,
        prompts::update_prompt_handler,
        prompts::delete_prompt_handler,
        sessions::list_sessions_handler,
        sessions::revoke_session_handler,
        files::upload_file_handler,
        files::speech_handler,
        files::download_file_handler,
        daily_activity::list_daily_activity_handler,
        daily_activity::weekly_report_handler,
    ),
    components(
        schemas(
            HealthResponse,
            auth::SocialLoginRequest,
            auth::RefreshRequest,
            auth::TokenPairResponse,
            users::UserResponse,
            users::UpdateProfileRequest,
            conversations::ConversationResponse,
            conversations::CreateConversationRequest,
            conversations::UpdateConversationRequest,
            messages::MessageResponse,
            messages::CreateMessageRequest,
            messages::CorrectionRequest,
            progress::ProgressResponse,
            agents::AgentResponse,
            agents::AgentRequest,
            agents::AgentStatsResponse,
            prompts::PromptResponse,
            prompts::PromptRequest,
            sessions::SessionResponse,
            files::StoredFileResponse,
            files::SpeechRequest,
            daily_activity::DailyActivityResponse,
            daily_activity::DayActivityResponse,
            daily_activity::WeeklyReportResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Conversa API", description = "Language practice with AI conversation agents. Every body is wrapped in a {message, error, data} envelope; the schemas below describe `data`.")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

//=========================================================================================
// Health
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler() -> HttpResult<HealthResponse> {
    let body = HealthResponse {
        status: "ok".to_string(),
    };
    Ok(ApiResponse::ok("OK", body))
}
