//! `PromptRepository` over the `prompts` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conversa_core::domain::{Prompt, PromptDraft};
use conversa_core::ports::{PortError, PortResult, PromptRepository};
use sqlx::FromRow;
use uuid::Uuid;

use super::{expect_affected, lookup_error, unexpected, DbAdapter};

#[derive(FromRow)]
struct PromptRecord {
    id: Uuid,
    agent_id: Uuid,
    title: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl PromptRecord {
    fn to_domain(self) -> Prompt {
        Prompt {
            id: self.id,
            agent_id: self.agent_id,
            title: self.title,
            content: self.content,
            created_at: self.created_at,
        }
    }
}

/// A prompt pointing at a missing agent is a lookup failure, not a server fault.
fn write_error(agent_id: Uuid) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
            PortError::NotFound(format!("Agent {} not found", agent_id))
        }
        sqlx::Error::RowNotFound => PortError::NotFound("Prompt not found".to_string()),
        _ => unexpected(e),
    }
}

#[async_trait]
impl PromptRepository for DbAdapter {
    async fn list_prompts(&self, agent_id: Uuid) -> PortResult<Vec<Prompt>> {
        let records = sqlx::query_as::<_, PromptRecord>(
            "SELECT id, agent_id, title, content, created_at \
             FROM prompts WHERE agent_id = $1 ORDER BY created_at ASC",
        )
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_prompt(&self, prompt_id: Uuid) -> PortResult<Prompt> {
        let record = sqlx::query_as::<_, PromptRecord>(
            "SELECT id, agent_id, title, content, created_at FROM prompts WHERE id = $1",
        )
        .bind(prompt_id)
        .fetch_one(&self.pool)
        .await
        .map_err(lookup_error(format!("Prompt {}", prompt_id)))?;
        Ok(record.to_domain())
    }

    async fn create_prompt(&self, draft: PromptDraft) -> PortResult<Prompt> {
        let record = sqlx::query_as::<_, PromptRecord>(
            "INSERT INTO prompts (id, agent_id, title, content) VALUES ($1, $2, $3, $4) \
             RETURNING id, agent_id, title, content, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(draft.agent_id)
        .bind(&draft.title)
        .bind(&draft.content)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error(draft.agent_id))?;
        Ok(record.to_domain())
    }

    async fn update_prompt(&self, prompt_id: Uuid, draft: PromptDraft) -> PortResult<Prompt> {
        let record = sqlx::query_as::<_, PromptRecord>(
            "UPDATE prompts SET agent_id = $2, title = $3, content = $4 WHERE id = $1 \
             RETURNING id, agent_id, title, content, created_at",
        )
        .bind(prompt_id)
        .bind(draft.agent_id)
        .bind(&draft.title)
        .bind(&draft.content)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error(draft.agent_id))?;
        Ok(record.to_domain())
    }

    async fn delete_prompt(&self, prompt_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM prompts WHERE id = $1")
            .bind(prompt_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        expect_affected(result.rows_affected(), format!("Prompt {}", prompt_id))
    }
}
