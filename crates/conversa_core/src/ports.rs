//! crates/conversa_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.
//!
//! Each entity gets its own repository port so components only depend on the
//! storage they actually touch.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::{
    Agent, AgentDraft, AuthSession, Conversation, ConversationAgentActivity, Message, NewMessage,
    NewUser, Progress, Prompt, PromptDraft, SocialProvider, StoredFile, User, UserDailyActivity,
    UserProfile, VerifiedIdentity,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Repository Ports
//=========================================================================================

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_social(
        &self,
        provider: SocialProvider,
        social_id: &str,
    ) -> PortResult<Option<User>>;

    async fn create_user(&self, new_user: NewUser) -> PortResult<User>;

    async fn get_user(&self, user_id: Uuid) -> PortResult<User>;

    async fn update_profile(&self, user_id: Uuid, profile: UserProfile) -> PortResult<User>;

    async fn touch_last_login(&self, user_id: Uuid, at: DateTime<Utc>) -> PortResult<()>;

    /// Purges the user; dependent rows go with it.
    async fn delete_user(&self, user_id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait AuthSessionRepository: Send + Sync {
    async fn create_session(&self, session: AuthSession) -> PortResult<()>;

    async fn get_session(&self, session_id: Uuid) -> PortResult<AuthSession>;

    async fn list_active_sessions(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> PortResult<Vec<AuthSession>>;

    async fn rotate_session(
        &self,
        session_id: Uuid,
        refresh_token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn revoke_session(&self, session_id: Uuid, at: DateTime<Utc>) -> PortResult<()>;
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn create_conversation(&self, user_id: Uuid, agent_id: Uuid) -> PortResult<Conversation>;

    async fn get_conversation(&self, conversation_id: Uuid) -> PortResult<Conversation>;

    async fn list_conversations(&self, user_id: Uuid) -> PortResult<Vec<Conversation>>;

    async fn update_summary(
        &self,
        conversation_id: Uuid,
        summary: Option<String>,
    ) -> PortResult<Conversation>;

    /// Stores the duration of a finished conversation. A duration is written once:
    /// returns `false` and leaves the row alone when one is already set.
    async fn set_duration(&self, conversation_id: Uuid, duration_seconds: i64)
        -> PortResult<bool>;

    async fn delete_conversation(&self, conversation_id: Uuid) -> PortResult<()>;

    /// Deletes conversations started before `started_before` that lasted under
    /// a minute or never ended, skipping the ids in `keep`. Returns the count removed.
    async fn delete_short_conversations(
        &self,
        started_before: DateTime<Utc>,
        keep: &[Uuid],
    ) -> PortResult<u64>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create_message(&self, message: NewMessage) -> PortResult<Message>;

    async fn get_message(&self, message_id: Uuid) -> PortResult<Message>;

    /// Messages of a conversation in creation order.
    async fn list_messages(&self, conversation_id: Uuid) -> PortResult<Vec<Message>>;

    async fn correct_message(&self, message_id: Uuid, corrected_text: &str) -> PortResult<Message>;
}

#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn list_agents(&self) -> PortResult<Vec<Agent>>;

    async fn get_agent(&self, agent_id: Uuid) -> PortResult<Agent>;

    async fn create_agent(&self, draft: AgentDraft) -> PortResult<Agent>;

    async fn update_agent(&self, agent_id: Uuid, draft: AgentDraft) -> PortResult<Agent>;

    /// Fails with `Validation` while any conversation still references the agent.
    async fn delete_agent(&self, agent_id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait PromptRepository: Send + Sync {
    /// Prompts of an agent in creation order.
    async fn list_prompts(&self, agent_id: Uuid) -> PortResult<Vec<Prompt>>;

    async fn get_prompt(&self, prompt_id: Uuid) -> PortResult<Prompt>;

    async fn create_prompt(&self, draft: PromptDraft) -> PortResult<Prompt>;

    async fn update_prompt(&self, prompt_id: Uuid, draft: PromptDraft) -> PortResult<Prompt>;

    async fn delete_prompt(&self, prompt_id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    async fn get_progress(&self, user_id: Uuid) -> PortResult<Option<Progress>>;

    /// Inserts or replaces the user's single progress row.
    async fn save_progress(&self, progress: &Progress) -> PortResult<()>;
}

#[async_trait]
pub trait ActivityRepository: Send + Sync {
    /// Inserts the activity row of a conversation. Returns `false` without writing
    /// when that conversation already has one.
    async fn record_activity(&self, activity: &ConversationAgentActivity) -> PortResult<bool>;

    async fn list_agent_activity(
        &self,
        user_id: Uuid,
        agent_id: Uuid,
    ) -> PortResult<Vec<ConversationAgentActivity>>;
}

#[async_trait]
pub trait DailyActivityRepository: Send + Sync {
    /// Adds minutes to the user's row for `date`, creating it if needed.
    async fn add_minutes(&self, user_id: Uuid, date: NaiveDate, minutes: i64) -> PortResult<()>;

    /// Rows with `from <= date <= to`, oldest first.
    async fn list_daily_activity(
        &self,
        user_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PortResult<Vec<UserDailyActivity>>;
}

//=========================================================================================
// External Service Ports
//=========================================================================================

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verifies a third-party identity token and returns the identity it asserts.
    async fn verify(&self, provider: SocialProvider, id_token: &str)
        -> PortResult<VerifiedIdentity>;
}

#[async_trait]
pub trait TextToSpeechService: Send + Sync {
    /// Generates audio data from a string of text.
    async fn generate_audio(&self, text: &str) -> PortResult<Vec<u8>>;
}

/// Everything a chat model needs to produce the agent's next reply.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub system_prompt: String,
    /// Prior messages, oldest first, excluding `user_content`.
    pub history: Vec<Message>,
    pub user_content: String,
}

#[async_trait]
pub trait ChatCompletionService: Send + Sync {
    async fn reply(&self, turn: &ChatTurn) -> PortResult<String>;
}

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Persists `bytes` under a fresh name with the given extension.
    async fn save(&self, bytes: &[u8], extension: &str) -> PortResult<StoredFile>;
}
