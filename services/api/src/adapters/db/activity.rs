//! `ActivityRepository` and `DailyActivityRepository` over the two activity tables.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use conversa_core::domain::{ConversationAgentActivity, UserDailyActivity};
use conversa_core::ports::{ActivityRepository, DailyActivityRepository, PortResult};
use sqlx::FromRow;
use uuid::Uuid;

use super::{unexpected, DbAdapter};

#[derive(FromRow)]
struct ActivityRecord {
    id: Uuid,
    conversation_id: Uuid,
    user_id: Uuid,
    agent_id: Uuid,
    duration_seconds: i64,
    message_count: i64,
    word_count: i64,
    words_per_minute: f64,
    created_at: DateTime<Utc>,
}

impl ActivityRecord {
    fn to_domain(self) -> ConversationAgentActivity {
        ConversationAgentActivity {
            id: self.id,
            conversation_id: self.conversation_id,
            user_id: self.user_id,
            agent_id: self.agent_id,
            duration_seconds: self.duration_seconds,
            message_count: self.message_count,
            word_count: self.word_count,
            words_per_minute: self.words_per_minute,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct DailyActivityRecord {
    user_id: Uuid,
    activity_date: NaiveDate,
    minutes_spoken: i64,
}

#[async_trait]
impl ActivityRepository for DbAdapter {
    async fn record_activity(&self, activity: &ConversationAgentActivity) -> PortResult<bool> {
        let result = sqlx::query(
            "INSERT INTO conversation_agent_activity \
             (id, conversation_id, user_id, agent_id, duration_seconds, message_count, word_count, \
              words_per_minute, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (conversation_id) DO NOTHING",
        )
        .bind(activity.id)
        .bind(activity.conversation_id)
        .bind(activity.user_id)
        .bind(activity.agent_id)
        .bind(activity.duration_seconds)
        .bind(activity.message_count)
        .bind(activity.word_count)
        .bind(activity.words_per_minute)
        .bind(activity.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_agent_activity(
        &self,
        user_id: Uuid,
        agent_id: Uuid,
    ) -> PortResult<Vec<ConversationAgentActivity>> {
        let records = sqlx::query_as::<_, ActivityRecord>(
            "SELECT id, conversation_id, user_id, agent_id, duration_seconds, message_count, \
             word_count, words_per_minute, created_at \
             FROM conversation_agent_activity WHERE user_id = $1 AND agent_id = $2 \
             ORDER BY created_at ASC",
        )
        .bind(user_id)
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}

#[async_trait]
impl DailyActivityRepository for DbAdapter {
    async fn add_minutes(&self, user_id: Uuid, date: NaiveDate, minutes: i64) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO user_daily_activity (user_id, activity_date, minutes_spoken) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, activity_date) \
             DO UPDATE SET minutes_spoken = user_daily_activity.minutes_spoken + EXCLUDED.minutes_spoken",
        )
        .bind(user_id)
        .bind(date)
        .bind(minutes)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn list_daily_activity(
        &self,
        user_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PortResult<Vec<UserDailyActivity>> {
        let records = sqlx::query_as::<_, DailyActivityRecord>(
            "SELECT user_id, activity_date, minutes_spoken FROM user_daily_activity \
             WHERE user_id = $1 AND activity_date BETWEEN $2 AND $3 \
             ORDER BY activity_date ASC",
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records
            .into_iter()
            .map(|r| UserDailyActivity {
                user_id: r.user_id,
                activity_date: r.activity_date,
                minutes_spoken: r.minutes_spoken,
            })
            .collect())
    }
}
