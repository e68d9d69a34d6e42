//! services/api/src/web/rest/progress.rs

use axum::{extract::State, Extension};
use chrono::{DateTime, NaiveDate, Utc};
use conversa_core::domain::{CefrLevel, Progress};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::response::{ApiResponse, HttpResult};
use crate::web::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct ProgressResponse {
    pub user_id: Uuid,
    pub total_conversation_minutes: i64,
    pub daily_conversation_count: i64,
    pub current_streak_days: i32,
    pub longest_streak_days: i32,
    pub last_conversation_date: Option<NaiveDate>,
    #[schema(value_type = String, example = "B1")]
    pub current_level: CefrLevel,
    pub updated_at: DateTime<Utc>,
}

impl From<Progress> for ProgressResponse {
    fn from(p: Progress) -> Self {
        Self {
            user_id: p.user_id,
            total_conversation_minutes: p.total_conversation_minutes,
            daily_conversation_count: p.daily_conversation_count,
            current_streak_days: p.current_streak_days,
            longest_streak_days: p.longest_streak_days,
            last_conversation_date: p.last_conversation_date,
            current_level: p.current_level,
            updated_at: p.updated_at,
        }
    }
}

/// Get the signed-in user's progress. Users with no finished conversation get a
/// fresh A1 record.
#[utoipa::path(
    get,
    path = "/progress",
    tag = "progress",
    responses((status = 200, description = "Progress", body = ProgressResponse)),
    security(("bearer" = []))
)]
pub async fn get_progress_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> HttpResult<ProgressResponse> {
    let progress = state
        .progress
        .get_progress(user_id)
        .await?
        .unwrap_or_else(|| Progress::new(user_id));
    Ok(ApiResponse::ok("Progress retrieved", progress.into()))
}
