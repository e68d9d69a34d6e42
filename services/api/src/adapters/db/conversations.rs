//! `ConversationRepository` over the `conversations` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conversa_core::domain::Conversation;
use conversa_core::ports::{ConversationRepository, PortResult};
use sqlx::FromRow;
use uuid::Uuid;

use super::{expect_affected, lookup_error, unexpected, DbAdapter};

#[derive(FromRow)]
struct ConversationRecord {
    id: Uuid,
    user_id: Uuid,
    agent_id: Uuid,
    started_at: DateTime<Utc>,
    summary: Option<String>,
    duration_seconds: Option<i64>,
}

impl ConversationRecord {
    fn to_domain(self) -> Conversation {
        Conversation {
            id: self.id,
            user_id: self.user_id,
            agent_id: self.agent_id,
            started_at: self.started_at,
            summary: self.summary,
            duration_seconds: self.duration_seconds,
        }
    }
}

#[async_trait]
impl ConversationRepository for DbAdapter {
    async fn create_conversation(&self, user_id: Uuid, agent_id: Uuid) -> PortResult<Conversation> {
        let record = sqlx::query_as::<_, ConversationRecord>(
            "INSERT INTO conversations (id, user_id, agent_id) VALUES ($1, $2, $3) \
             RETURNING id, user_id, agent_id, started_at, summary, duration_seconds",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(agent_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_conversation(&self, conversation_id: Uuid) -> PortResult<Conversation> {
        let record = sqlx::query_as::<_, ConversationRecord>(
            "SELECT id, user_id, agent_id, started_at, summary, duration_seconds \
             FROM conversations WHERE id = $1",
        )
        .bind(conversation_id)
        .fetch_one(&self.pool)
        .await
        .map_err(lookup_error(format!("Conversation {}", conversation_id)))?;
        Ok(record.to_domain())
    }

    async fn list_conversations(&self, user_id: Uuid) -> PortResult<Vec<Conversation>> {
        let records = sqlx::query_as::<_, ConversationRecord>(
            "SELECT id, user_id, agent_id, started_at, summary, duration_seconds \
             FROM conversations WHERE user_id = $1 ORDER BY started_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn update_summary(
        &self,
        conversation_id: Uuid,
        summary: Option<String>,
    ) -> PortResult<Conversation> {
        let record = sqlx::query_as::<_, ConversationRecord>(
            "UPDATE conversations SET summary = $2 WHERE id = $1 \
             RETURNING id, user_id, agent_id, started_at, summary, duration_seconds",
        )
        .bind(conversation_id)
        .bind(summary)
        .fetch_one(&self.pool)
        .await
        .map_err(lookup_error(format!("Conversation {}", conversation_id)))?;
        Ok(record.to_domain())
    }

    async fn set_duration(
        &self,
        conversation_id: Uuid,
        duration_seconds: i64,
    ) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE conversations SET duration_seconds = $2 \
             WHERE id = $1 AND duration_seconds IS NULL",
        )
        .bind(conversation_id)
        .bind(duration_seconds)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 1 {
            return Ok(true);
        }
        // Nothing written: either the duration was already set or the row is gone.
        self.get_conversation(conversation_id).await.map(|_| false)
    }

    async fn delete_conversation(&self, conversation_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = $1")
            .bind(conversation_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        expect_affected(result.rows_affected(), format!("Conversation {}", conversation_id))
    }

    async fn delete_short_conversations(
        &self,
        started_before: DateTime<Utc>,
        keep: &[Uuid],
    ) -> PortResult<u64> {
        let result = sqlx::query(
            "DELETE FROM conversations \
             WHERE started_at < $1 \
               AND (duration_seconds IS NULL OR duration_seconds < 60) \
               AND NOT (id = ANY($2))",
        )
        .bind(started_before)
        .bind(keep)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected())
    }
}
