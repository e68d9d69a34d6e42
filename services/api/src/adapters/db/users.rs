//! `UserRepository` over the `users` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conversa_core::domain::{NewUser, SocialProvider, User, UserProfile};
use conversa_core::ports::{PortResult, UserRepository};
use sqlx::FromRow;
use uuid::Uuid;

use super::{corrupt, expect_affected, lookup_error, unexpected, DbAdapter};

const USER_COLUMNS: &str = "id, provider, social_id, email, display_name, native_language, \
     target_language, proficiency, age_range, learning_goals, created_at, last_login_at";

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    provider: String,
    social_id: String,
    email: Option<String>,
    display_name: Option<String>,
    native_language: Option<String>,
    target_language: Option<String>,
    proficiency: Option<String>,
    age_range: Option<String>,
    learning_goals: Vec<String>,
    created_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
}

impl UserRecord {
    fn to_domain(self) -> PortResult<User> {
        Ok(User {
            id: self.id,
            provider: self.provider.parse().map_err(corrupt)?,
            social_id: self.social_id,
            email: self.email,
            display_name: self.display_name,
            profile: UserProfile {
                native_language: self.native_language,
                target_language: self.target_language,
                proficiency: self.proficiency,
                age_range: self.age_range,
                learning_goals: self.learning_goals,
            },
            created_at: self.created_at,
            last_login_at: self.last_login_at,
        })
    }
}

#[async_trait]
impl UserRepository for DbAdapter {
    async fn find_by_social(
        &self,
        provider: SocialProvider,
        social_id: &str,
    ) -> PortResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE provider = $1 AND social_id = $2"
        ))
        .bind(provider.as_str())
        .bind(social_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        record.map(UserRecord::to_domain).transpose()
    }

    async fn create_user(&self, new_user: NewUser) -> PortResult<User> {
        // A concurrent first login for the same identity lands on the existing row.
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "INSERT INTO users (id, provider, social_id, email, display_name) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (provider, social_id) DO UPDATE SET email = COALESCE(EXCLUDED.email, users.email) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new_user.provider.as_str())
        .bind(&new_user.social_id)
        .bind(&new_user.email)
        .bind(&new_user.display_name)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        record.to_domain()
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        sqlx::query_as::<_, UserRecord>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(lookup_error(format!("User {}", user_id)))?
            .to_domain()
    }

    async fn update_profile(&self, user_id: Uuid, profile: UserProfile) -> PortResult<User> {
        sqlx::query_as::<_, UserRecord>(&format!(
            "UPDATE users SET native_language = $2, target_language = $3, proficiency = $4, \
             age_range = $5, learning_goals = $6 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(&profile.native_language)
        .bind(&profile.target_language)
        .bind(&profile.proficiency)
        .bind(&profile.age_range)
        .bind(&profile.learning_goals)
        .fetch_one(&self.pool)
        .await
        .map_err(lookup_error(format!("User {}", user_id)))?
        .to_domain()
    }

    async fn touch_last_login(&self, user_id: Uuid, at: DateTime<Utc>) -> PortResult<()> {
        let result = sqlx::query("UPDATE users SET last_login_at = $2 WHERE id = $1")
            .bind(user_id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        expect_affected(result.rows_affected(), format!("User {}", user_id))
    }

    async fn delete_user(&self, user_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        expect_affected(result.rows_affected(), format!("User {}", user_id))
    }
}
