//! `AuthSessionRepository` over the `auth_sessions` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conversa_core::domain::AuthSession;
use conversa_core::ports::{AuthSessionRepository, PortResult};
use sqlx::FromRow;
use uuid::Uuid;

use super::{expect_affected, lookup_error, unexpected, DbAdapter};

#[derive(FromRow)]
struct AuthSessionRecord {
    id: Uuid,
    user_id: Uuid,
    refresh_token_hash: String,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

impl AuthSessionRecord {
    fn to_domain(self) -> AuthSession {
        AuthSession {
            id: self.id,
            user_id: self.user_id,
            refresh_token_hash: self.refresh_token_hash,
            user_agent: self.user_agent,
            created_at: self.created_at,
            expires_at: self.expires_at,
            revoked_at: self.revoked_at,
        }
    }
}

#[async_trait]
impl AuthSessionRepository for DbAdapter {
    async fn create_session(&self, session: AuthSession) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO auth_sessions (id, user_id, refresh_token_hash, user_agent, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.refresh_token_hash)
        .bind(&session.user_agent)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> PortResult<AuthSession> {
        let record = sqlx::query_as::<_, AuthSessionRecord>(
            "SELECT id, user_id, refresh_token_hash, user_agent, created_at, expires_at, revoked_at \
             FROM auth_sessions WHERE id = $1",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(lookup_error(format!("Session {}", session_id)))?;
        Ok(record.to_domain())
    }

    async fn list_active_sessions(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> PortResult<Vec<AuthSession>> {
        let records = sqlx::query_as::<_, AuthSessionRecord>(
            "SELECT id, user_id, refresh_token_hash, user_agent, created_at, expires_at, revoked_at \
             FROM auth_sessions \
             WHERE user_id = $1 AND revoked_at IS NULL AND expires_at > $2 \
             ORDER BY created_at ASC",
        )
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn rotate_session(
        &self,
        session_id: Uuid,
        refresh_token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE auth_sessions SET refresh_token_hash = $2, expires_at = $3 WHERE id = $1",
        )
        .bind(session_id)
        .bind(refresh_token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        expect_affected(result.rows_affected(), format!("Session {}", session_id))
    }

    async fn revoke_session(&self, session_id: Uuid, at: DateTime<Utc>) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE auth_sessions SET revoked_at = COALESCE(revoked_at, $2) WHERE id = $1",
        )
        .bind(session_id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        expect_affected(result.rows_affected(), format!("Session {}", session_id))
    }
}
