//! `AgentRepository` over the `agents` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conversa_core::domain::{Agent, AgentDraft};
use conversa_core::ports::{AgentRepository, PortError, PortResult};
use sqlx::FromRow;
use uuid::Uuid;

use super::{corrupt, expect_affected, lookup_error, unexpected, DbAdapter};

#[derive(FromRow)]
struct AgentRecord {
    id: Uuid,
    name: String,
    agent_type: String,
    description: Option<String>,
    voice: Option<String>,
    persona: String,
    created_at: DateTime<Utc>,
}

impl AgentRecord {
    fn to_domain(self) -> PortResult<Agent> {
        Ok(Agent {
            id: self.id,
            name: self.name,
            agent_type: self.agent_type.parse().map_err(corrupt)?,
            description: self.description,
            voice: self.voice,
            persona: self.persona,
            created_at: self.created_at,
        })
    }
}

#[async_trait]
impl AgentRepository for DbAdapter {
    async fn list_agents(&self) -> PortResult<Vec<Agent>> {
        let records = sqlx::query_as::<_, AgentRecord>(
            "SELECT id, name, agent_type, description, voice, persona, created_at \
             FROM agents ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(AgentRecord::to_domain).collect()
    }

    async fn get_agent(&self, agent_id: Uuid) -> PortResult<Agent> {
        sqlx::query_as::<_, AgentRecord>(
            "SELECT id, name, agent_type, description, voice, persona, created_at \
             FROM agents WHERE id = $1",
        )
        .bind(agent_id)
        .fetch_one(&self.pool)
        .await
        .map_err(lookup_error(format!("Agent {}", agent_id)))?
        .to_domain()
    }

    async fn create_agent(&self, draft: AgentDraft) -> PortResult<Agent> {
        sqlx::query_as::<_, AgentRecord>(
            "INSERT INTO agents (id, name, agent_type, description, voice, persona) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, name, agent_type, description, voice, persona, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(&draft.name)
        .bind(draft.agent_type.as_str())
        .bind(&draft.description)
        .bind(&draft.voice)
        .bind(&draft.persona)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?
        .to_domain()
    }

    async fn update_agent(&self, agent_id: Uuid, draft: AgentDraft) -> PortResult<Agent> {
        sqlx::query_as::<_, AgentRecord>(
            "UPDATE agents SET name = $2, agent_type = $3, description = $4, voice = $5, persona = $6 \
             WHERE id = $1 \
             RETURNING id, name, agent_type, description, voice, persona, created_at",
        )
        .bind(agent_id)
        .bind(&draft.name)
        .bind(draft.agent_type.as_str())
        .bind(&draft.description)
        .bind(&draft.voice)
        .bind(&draft.persona)
        .fetch_one(&self.pool)
        .await
        .map_err(lookup_error(format!("Agent {}", agent_id)))?
        .to_domain()
    }

    async fn delete_agent(&self, agent_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM agents WHERE id = $1")
            .bind(agent_id)
            .execute(&self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                    PortError::Validation(format!(
                        "Agent {} is in use by existing conversations",
                        agent_id
                    ))
                }
                _ => unexpected(e),
            })?;
        expect_affected(result.rows_affected(), format!("Agent {}", agent_id))
    }
}
