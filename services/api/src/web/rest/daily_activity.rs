//! services/api/src/web/rest/daily_activity.rs

use axum::{
    extract::State,
    Extension,
};
use chrono::{Duration, NaiveDate, Utc};
use conversa_core::activity::{week_start, weekly_report};
use conversa_core::domain::UserDailyActivity;
use conversa_core::{DayActivity, WeeklyReport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::web::response::{ApiResponse, AppQuery, HttpError, HttpResult};
use crate::web::state::AppState;

/// Window used when `from` is omitted.
const DEFAULT_RANGE_DAYS: i64 = 6;

#[derive(Debug, Serialize, ToSchema)]
pub struct DailyActivityResponse {
    pub activity_date: NaiveDate,
    pub minutes_spoken: i64,
}

impl From<UserDailyActivity> for DailyActivityResponse {
    fn from(d: UserDailyActivity) -> Self {
        Self {
            activity_date: d.activity_date,
            minutes_spoken: d.minutes_spoken,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DayActivityResponse {
    pub date: NaiveDate,
    pub minutes_spoken: i64,
    pub completed: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WeeklyReportResponse {
    pub week_start: NaiveDate,
    pub days: Vec<DayActivityResponse>,
    pub completed_days: usize,
    pub total_minutes: i64,
}

impl From<DayActivity> for DayActivityResponse {
    fn from(d: DayActivity) -> Self {
        Self {
            date: d.date,
            minutes_spoken: d.minutes_spoken,
            completed: d.completed,
        }
    }
}

impl From<WeeklyReport> for WeeklyReportResponse {
    fn from(r: WeeklyReport) -> Self {
        Self {
            week_start: r.week_start,
            days: r.days.into_iter().map(Into::into).collect(),
            completed_days: r.completed_days,
            total_minutes: r.total_minutes,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RangeQuery {
    /// First day, inclusive. Defaults to six days before `to`.
    pub from: Option<NaiveDate>,
    /// Last day, inclusive. Defaults to today (UTC).
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WeekQuery {
    /// Any day of the wanted week. Defaults to today (UTC).
    pub date: Option<NaiveDate>,
}

/// Minutes spoken per day over a date range, oldest first. Days without
/// conversations are omitted.
#[utoipa::path(
    get,
    path = "/daily-activity",
    tag = "daily-activity",
    params(RangeQuery),
    responses(
        (status = 200, description = "Daily activity", body = [DailyActivityResponse]),
        (status = 400, description = "`from` is after `to`")
    ),
    security(("bearer" = []))
)]
pub async fn list_daily_activity_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    AppQuery(query): AppQuery<RangeQuery>,
) -> HttpResult<Vec<DailyActivityResponse>> {
    let to = query.to.unwrap_or_else(|| Utc::now().date_naive());
    let from = query
        .from
        .unwrap_or_else(|| to - Duration::days(DEFAULT_RANGE_DAYS));
    if from > to {
        return Err(HttpError::BadRequest("from must not be after to".to_string()));
    }

    let rows = state.daily.list_daily_activity(user_id, from, to).await?;
    Ok(ApiResponse::ok(
        "Daily activity retrieved",
        rows.into_iter().map(Into::into).collect(),
    ))
}

/// Monday-to-Sunday completion report for the week containing `date`.
#[utoipa::path(
    get,
    path = "/daily-activity/week",
    tag = "daily-activity",
    params(WeekQuery),
    responses((status = 200, description = "Weekly report", body = WeeklyReportResponse)),
    security(("bearer" = []))
)]
pub async fn weekly_report_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    AppQuery(query): AppQuery<WeekQuery>,
) -> HttpResult<WeeklyReportResponse> {
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let start = week_start(date);
    let rows = state
        .daily
        .list_daily_activity(user_id, start, start + Duration::days(6))
        .await?;
    Ok(ApiResponse::ok(
        "Weekly report retrieved",
        weekly_report(start, &rows).into(),
    ))
}
