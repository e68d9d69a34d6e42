//! `MessageRepository` over the `messages` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conversa_core::domain::{Message, NewMessage};
use conversa_core::ports::{MessageRepository, PortError, PortResult};
use sqlx::FromRow;
use uuid::Uuid;

use super::{corrupt, lookup_error, unexpected, DbAdapter};

#[derive(FromRow)]
struct MessageRecord {
    id: Uuid,
    conversation_id: Uuid,
    role: String,
    content: String,
    audio_url: Option<String>,
    corrected_text: Option<String>,
    created_at: DateTime<Utc>,
}

impl MessageRecord {
    fn to_domain(self) -> PortResult<Message> {
        Ok(Message {
            id: self.id,
            conversation_id: self.conversation_id,
            role: self.role.parse().map_err(corrupt)?,
            content: self.content,
            audio_url: self.audio_url,
            corrected_text: self.corrected_text,
            created_at: self.created_at,
        })
    }
}

#[async_trait]
impl MessageRepository for DbAdapter {
    async fn create_message(&self, message: NewMessage) -> PortResult<Message> {
        let record = sqlx::query_as::<_, MessageRecord>(
            "INSERT INTO messages (id, conversation_id, role, content, audio_url) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, conversation_id, role, content, audio_url, corrected_text, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(message.conversation_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(&message.audio_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => PortError::NotFound(
                format!("Conversation {} not found", message.conversation_id),
            ),
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn get_message(&self, message_id: Uuid) -> PortResult<Message> {
        sqlx::query_as::<_, MessageRecord>(
            "SELECT id, conversation_id, role, content, audio_url, corrected_text, created_at \
             FROM messages WHERE id = $1",
        )
        .bind(message_id)
        .fetch_one(&self.pool)
        .await
        .map_err(lookup_error(format!("Message {}", message_id)))?
        .to_domain()
    }

    async fn list_messages(&self, conversation_id: Uuid) -> PortResult<Vec<Message>> {
        let records = sqlx::query_as::<_, MessageRecord>(
            "SELECT id, conversation_id, role, content, audio_url, corrected_text, created_at \
             FROM messages WHERE conversation_id = $1 ORDER BY created_at ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(MessageRecord::to_domain).collect()
    }

    async fn correct_message(&self, message_id: Uuid, corrected_text: &str) -> PortResult<Message> {
        sqlx::query_as::<_, MessageRecord>(
            "UPDATE messages SET corrected_text = $2 WHERE id = $1 \
             RETURNING id, conversation_id, role, content, audio_url, corrected_text, created_at",
        )
        .bind(message_id)
        .bind(corrected_text)
        .fetch_one(&self.pool)
        .await
        .map_err(lookup_error(format!("Message {}", message_id)))?
        .to_domain()
    }
}
