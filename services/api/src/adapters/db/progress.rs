//! `ProgressRepository` over the `progress` table.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use conversa_core::domain::Progress;
use conversa_core::ports::{PortResult, ProgressRepository};
use sqlx::FromRow;
use uuid::Uuid;

use super::{corrupt, unexpected, DbAdapter};

#[derive(FromRow)]
struct ProgressRecord {
    user_id: Uuid,
    total_conversation_minutes: i64,
    daily_conversation_count: i64,
    current_streak_days: i32,
    longest_streak_days: i32,
    last_conversation_date: Option<NaiveDate>,
    current_level: String,
    updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    fn to_domain(self) -> PortResult<Progress> {
        Ok(Progress {
            user_id: self.user_id,
            total_conversation_minutes: self.total_conversation_minutes,
            daily_conversation_count: self.daily_conversation_count,
            current_streak_days: self.current_streak_days,
            longest_streak_days: self.longest_streak_days,
            last_conversation_date: self.last_conversation_date,
            current_level: self.current_level.parse().map_err(corrupt)?,
            updated_at: self.updated_at,
        })
    }
}

#[async_trait]
impl ProgressRepository for DbAdapter {
    async fn get_progress(&self, user_id: Uuid) -> PortResult<Option<Progress>> {
        let record = sqlx::query_as::<_, ProgressRecord>(
            "SELECT user_id, total_conversation_minutes, daily_conversation_count, \
             current_streak_days, longest_streak_days, last_conversation_date, current_level, updated_at \
             FROM progress WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        record.map(ProgressRecord::to_domain).transpose()
    }

    async fn save_progress(&self, progress: &Progress) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO progress (user_id, total_conversation_minutes, daily_conversation_count, \
             current_streak_days, longest_streak_days, last_conversation_date, current_level, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (user_id) DO UPDATE SET \
                total_conversation_minutes = EXCLUDED.total_conversation_minutes, \
                daily_conversation_count = EXCLUDED.daily_conversation_count, \
                current_streak_days = EXCLUDED.current_streak_days, \
                longest_streak_days = EXCLUDED.longest_streak_days, \
                last_conversation_date = EXCLUDED.last_conversation_date, \
                current_level = EXCLUDED.current_level, \
                updated_at = EXCLUDED.updated_at",
        )
        .bind(progress.user_id)
        .bind(progress.total_conversation_minutes)
        .bind(progress.daily_conversation_count)
        .bind(progress.current_streak_days)
        .bind(progress.longest_streak_days)
        .bind(progress.last_conversation_date)
        .bind(progress.current_level.as_str())
        .bind(progress.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }
}
