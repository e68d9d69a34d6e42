//! crates/conversa_core/src/testing.rs
//!
//! In-memory implementations of the repository ports, for tests in this crate and
//! (through the `testing` feature) in the web service.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::{
    Agent, AgentDraft, AuthSession, Conversation, ConversationAgentActivity, Message, NewMessage,
    NewUser, Progress, Prompt, PromptDraft, SocialProvider, User, UserDailyActivity, UserProfile,
};
use crate::ports::{
    ActivityRepository, AgentRepository, AuthSessionRepository, ConversationRepository,
    DailyActivityRepository, MessageRepository, PortError, PortResult, ProgressRepository,
    PromptRepository, UserRepository,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    sessions: HashMap<Uuid, AuthSession>,
    conversations: HashMap<Uuid, Conversation>,
    messages: Vec<Message>,
    agents: HashMap<Uuid, Agent>,
    prompts: Vec<Prompt>,
    progress: HashMap<Uuid, Progress>,
    activity: Vec<ConversationAgentActivity>,
    daily: HashMap<(Uuid, NaiveDate), i64>,
}

/// A single store backing every repository port, with the same delete rules as
/// the Postgres schema: users cascade to everything they own, conversations to
/// their messages and activity, agents to their prompts only. An agent that still
/// has conversations cannot be deleted.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        // A poisoned lock only means another test thread panicked.
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Inserts a user directly, bypassing social login.
    pub fn seed_user(&self, provider: SocialProvider, social_id: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            provider,
            social_id: social_id.to_string(),
            email: None,
            display_name: None,
            profile: UserProfile::default(),
            created_at: Utc::now(),
            last_login_at: None,
        };
        self.tables().users.insert(user.id, user.clone());
        user
    }

    /// Counts rows in every user-owned table that still reference `user_id`.
    pub fn rows_owned_by(&self, user_id: Uuid) -> usize {
        let t = self.tables();
        t.conversations.values().filter(|c| c.user_id == user_id).count()
            + t.progress.keys().filter(|id| **id == user_id).count()
            + t.activity.iter().filter(|a| a.user_id == user_id).count()
            + t.daily.keys().filter(|(id, _)| *id == user_id).count()
            + t.sessions.values().filter(|s| s.user_id == user_id).count()
    }
}

fn not_found(kind: &str, id: impl std::fmt::Display) -> PortError {
    PortError::NotFound(format!("{kind} {id} not found"))
}

fn agent_in_use(agent_id: Uuid) -> PortError {
    PortError::Validation(format!(
        "Agent {agent_id} is in use by existing conversations"
    ))
}

fn remove_conversation(t: &mut Tables, conversation_id: Uuid) {
    t.conversations.remove(&conversation_id);
    t.messages.retain(|m| m.conversation_id != conversation_id);
    t.activity.retain(|a| a.conversation_id != conversation_id);
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_social(
        &self,
        provider: SocialProvider,
        social_id: &str,
    ) -> PortResult<Option<User>> {
        Ok(self
            .tables()
            .users
            .values()
            .find(|u| u.provider == provider && u.social_id == social_id)
            .cloned())
    }

    async fn create_user(&self, new_user: NewUser) -> PortResult<User> {
        let mut t = self.tables();
        if t.users
            .values()
            .any(|u| u.provider == new_user.provider && u.social_id == new_user.social_id)
        {
            return Err(PortError::Unexpected("duplicate social identity".to_string()));
        }
        let user = User {
            id: Uuid::new_v4(),
            provider: new_user.provider,
            social_id: new_user.social_id,
            email: new_user.email,
            display_name: new_user.display_name,
            profile: UserProfile::default(),
            created_at: Utc::now(),
            last_login_at: None,
        };
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        self.tables()
            .users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| not_found("User", user_id))
    }

    async fn update_profile(&self, user_id: Uuid, profile: UserProfile) -> PortResult<User> {
        let mut t = self.tables();
        let user = t
            .users
            .get_mut(&user_id)
            .ok_or_else(|| not_found("User", user_id))?;
        user.profile = profile;
        Ok(user.clone())
    }

    async fn touch_last_login(&self, user_id: Uuid, at: DateTime<Utc>) -> PortResult<()> {
        let mut t = self.tables();
        let user = t
            .users
            .get_mut(&user_id)
            .ok_or_else(|| not_found("User", user_id))?;
        user.last_login_at = Some(at);
        Ok(())
    }

    async fn delete_user(&self, user_id: Uuid) -> PortResult<()> {
        let mut t = self.tables();
        if t.users.remove(&user_id).is_none() {
            return Err(not_found("User", user_id));
        }
        let owned: Vec<Uuid> = t
            .conversations
            .values()
            .filter(|c| c.user_id == user_id)
            .map(|c| c.id)
            .collect();
        for id in owned {
            remove_conversation(&mut t, id);
        }
        t.progress.remove(&user_id);
        t.activity.retain(|a| a.user_id != user_id);
        t.daily.retain(|(id, _), _| *id != user_id);
        t.sessions.retain(|_, s| s.user_id != user_id);
        Ok(())
    }
}

#[async_trait]
impl AuthSessionRepository for MemoryStore {
    async fn create_session(&self, session: AuthSession) -> PortResult<()> {
        self.tables().sessions.insert(session.id, session);
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> PortResult<AuthSession> {
        self.tables()
            .sessions
            .get(&session_id)
            .cloned()
            .ok_or_else(|| not_found("Session", session_id))
    }

    async fn list_active_sessions(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> PortResult<Vec<AuthSession>> {
        let mut sessions: Vec<AuthSession> = self
            .tables()
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && s.is_active(now))
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.created_at);
        Ok(sessions)
    }

    async fn rotate_session(
        &self,
        session_id: Uuid,
        refresh_token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut t = self.tables();
        let session = t
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| not_found("Session", session_id))?;
        session.refresh_token_hash = refresh_token_hash.to_string();
        session.expires_at = expires_at;
        Ok(())
    }

    async fn revoke_session(&self, session_id: Uuid, at: DateTime<Utc>) -> PortResult<()> {
        let mut t = self.tables();
        let session = t
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| not_found("Session", session_id))?;
        session.revoked_at.get_or_insert(at);
        Ok(())
    }
}

#[async_trait]
impl ConversationRepository for MemoryStore {
    async fn create_conversation(&self, user_id: Uuid, agent_id: Uuid) -> PortResult<Conversation> {
        let conversation = Conversation {
            id: Uuid::new_v4(),
            user_id,
            agent_id,
            started_at: Utc::now(),
            summary: None,
            duration_seconds: None,
        };
        self.tables()
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    async fn get_conversation(&self, conversation_id: Uuid) -> PortResult<Conversation> {
        self.tables()
            .conversations
            .get(&conversation_id)
            .cloned()
            .ok_or_else(|| not_found("Conversation", conversation_id))
    }

    async fn list_conversations(&self, user_id: Uuid) -> PortResult<Vec<Conversation>> {
        let mut list: Vec<Conversation> = self
            .tables()
            .conversations
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(list)
    }

    async fn update_summary(
        &self,
        conversation_id: Uuid,
        summary: Option<String>,
    ) -> PortResult<Conversation> {
        let mut t = self.tables();
        let conversation = t
            .conversations
            .get_mut(&conversation_id)
            .ok_or_else(|| not_found("Conversation", conversation_id))?;
        conversation.summary = summary;
        Ok(conversation.clone())
    }

    async fn set_duration(
        &self,
        conversation_id: Uuid,
        duration_seconds: i64,
    ) -> PortResult<bool> {
        let mut t = self.tables();
        let conversation = t
            .conversations
            .get_mut(&conversation_id)
            .ok_or_else(|| not_found("Conversation", conversation_id))?;
        if conversation.duration_seconds.is_some() {
            return Ok(false);
        }
        conversation.duration_seconds = Some(duration_seconds);
        Ok(true)
    }

    async fn delete_conversation(&self, conversation_id: Uuid) -> PortResult<()> {
        let mut t = self.tables();
        if !t.conversations.contains_key(&conversation_id) {
            return Err(not_found("Conversation", conversation_id));
        }
        remove_conversation(&mut t, conversation_id);
        Ok(())
    }

    async fn delete_short_conversations(
        &self,
        started_before: DateTime<Utc>,
        keep: &[Uuid],
    ) -> PortResult<u64> {
        let mut t = self.tables();
        let doomed: Vec<Uuid> = t
            .conversations
            .values()
            .filter(|c| c.started_at < started_before && !keep.contains(&c.id))
            .filter(|c| c.duration_seconds.map_or(true, |d| d < 60))
            .map(|c| c.id)
            .collect();
        for id in &doomed {
            remove_conversation(&mut t, *id);
        }
        Ok(doomed.len() as u64)
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn create_message(&self, message: NewMessage) -> PortResult<Message> {
        let mut t = self.tables();
        if !t.conversations.contains_key(&message.conversation_id) {
            return Err(not_found("Conversation", message.conversation_id));
        }
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id: message.conversation_id,
            role: message.role,
            content: message.content,
            audio_url: message.audio_url,
            corrected_text: None,
            created_at: Utc::now(),
        };
        t.messages.push(message.clone());
        Ok(message)
    }

    async fn get_message(&self, message_id: Uuid) -> PortResult<Message> {
        self.tables()
            .messages
            .iter()
            .find(|m| m.id == message_id)
            .cloned()
            .ok_or_else(|| not_found("Message", message_id))
    }

    async fn list_messages(&self, conversation_id: Uuid) -> PortResult<Vec<Message>> {
        Ok(self
            .tables()
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    async fn correct_message(&self, message_id: Uuid, corrected_text: &str) -> PortResult<Message> {
        let mut t = self.tables();
        let message = t
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| not_found("Message", message_id))?;
        message.corrected_text = Some(corrected_text.to_string());
        Ok(message.clone())
    }
}

#[async_trait]
impl AgentRepository for MemoryStore {
    async fn list_agents(&self) -> PortResult<Vec<Agent>> {
        let mut agents: Vec<Agent> = self.tables().agents.values().cloned().collect();
        agents.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(agents)
    }

    async fn get_agent(&self, agent_id: Uuid) -> PortResult<Agent> {
        self.tables()
            .agents
            .get(&agent_id)
            .cloned()
            .ok_or_else(|| not_found("Agent", agent_id))
    }

    async fn create_agent(&self, draft: AgentDraft) -> PortResult<Agent> {
        let agent = Agent {
            id: Uuid::new_v4(),
            name: draft.name,
            agent_type: draft.agent_type,
            description: draft.description,
            voice: draft.voice,
            persona: draft.persona,
            created_at: Utc::now(),
        };
        self.tables().agents.insert(agent.id, agent.clone());
        Ok(agent)
    }

    async fn update_agent(&self, agent_id: Uuid, draft: AgentDraft) -> PortResult<Agent> {
        let mut t = self.tables();
        let agent = t
            .agents
            .get_mut(&agent_id)
            .ok_or_else(|| not_found("Agent", agent_id))?;
        agent.name = draft.name;
        agent.agent_type = draft.agent_type;
        agent.description = draft.description;
        agent.voice = draft.voice;
        agent.persona = draft.persona;
        Ok(agent.clone())
    }

    async fn delete_agent(&self, agent_id: Uuid) -> PortResult<()> {
        let mut t = self.tables();
        if !t.agents.contains_key(&agent_id) {
            return Err(not_found("Agent", agent_id));
        }
        let in_use = t.conversations.values().any(|c| c.agent_id == agent_id)
            || t.activity.iter().any(|a| a.agent_id == agent_id);
        if in_use {
            return Err(agent_in_use(agent_id));
        }
        t.agents.remove(&agent_id);
        t.prompts.retain(|p| p.agent_id != agent_id);
        Ok(())
    }
}

#[async_trait]
impl PromptRepository for MemoryStore {
    async fn list_prompts(&self, agent_id: Uuid) -> PortResult<Vec<Prompt>> {
        Ok(self
            .tables()
            .prompts
            .iter()
            .filter(|p| p.agent_id == agent_id)
            .cloned()
            .collect())
    }

    async fn get_prompt(&self, prompt_id: Uuid) -> PortResult<Prompt> {
        self.tables()
            .prompts
            .iter()
            .find(|p| p.id == prompt_id)
            .cloned()
            .ok_or_else(|| not_found("Prompt", prompt_id))
    }

    async fn create_prompt(&self, draft: PromptDraft) -> PortResult<Prompt> {
        let mut t = self.tables();
        if !t.agents.contains_key(&draft.agent_id) {
            return Err(not_found("Agent", draft.agent_id));
        }
        let prompt = Prompt {
            id: Uuid::new_v4(),
            agent_id: draft.agent_id,
            title: draft.title,
            content: draft.content,
            created_at: Utc::now(),
        };
        t.prompts.push(prompt.clone());
        Ok(prompt)
    }

    async fn update_prompt(&self, prompt_id: Uuid, draft: PromptDraft) -> PortResult<Prompt> {
        let mut t = self.tables();
        let prompt = t
            .prompts
            .iter_mut()
            .find(|p| p.id == prompt_id)
            .ok_or_else(|| not_found("Prompt", prompt_id))?;
        prompt.agent_id = draft.agent_id;
        prompt.title = draft.title;
        prompt.content = draft.content;
        Ok(prompt.clone())
    }

    async fn delete_prompt(&self, prompt_id: Uuid) -> PortResult<()> {
        let mut t = self.tables();
        let before = t.prompts.len();
        t.prompts.retain(|p| p.id != prompt_id);
        if t.prompts.len() == before {
            return Err(not_found("Prompt", prompt_id));
        }
        Ok(())
    }
}

#[async_trait]
impl ProgressRepository for MemoryStore {
    async fn get_progress(&self, user_id: Uuid) -> PortResult<Option<Progress>> {
        Ok(self.tables().progress.get(&user_id).cloned())
    }

    async fn save_progress(&self, progress: &Progress) -> PortResult<()> {
        self.tables()
            .progress
            .insert(progress.user_id, progress.clone());
        Ok(())
    }
}

#[async_trait]
impl ActivityRepository for MemoryStore {
    async fn record_activity(&self, activity: &ConversationAgentActivity) -> PortResult<bool> {
        let mut t = self.tables();
        if t
            .activity
            .iter()
            .any(|a| a.conversation_id == activity.conversation_id)
        {
            return Ok(false);
        }
        t.activity.push(activity.clone());
        Ok(true)
    }

    async fn list_agent_activity(
        &self,
        user_id: Uuid,
        agent_id: Uuid,
    ) -> PortResult<Vec<ConversationAgentActivity>> {
        Ok(self
            .tables()
            .activity
            .iter()
            .filter(|a| a.user_id == user_id && a.agent_id == agent_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DailyActivityRepository for MemoryStore {
    async fn add_minutes(&self, user_id: Uuid, date: NaiveDate, minutes: i64) -> PortResult<()> {
        *self.tables().daily.entry((user_id, date)).or_insert(0) += minutes;
        Ok(())
    }

    async fn list_daily_activity(
        &self,
        user_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PortResult<Vec<UserDailyActivity>> {
        let mut rows: Vec<UserDailyActivity> = self
            .tables()
            .daily
            .iter()
            .filter(|((id, date), _)| *id == user_id && *date >= from && *date <= to)
            .map(|((id, date), minutes)| UserDailyActivity {
                user_id: *id,
                activity_date: *date,
                minutes_spoken: *minutes,
            })
            .collect();
        rows.sort_by_key(|r| r.activity_date);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AgentType;

    #[tokio::test]
    async fn test_delete_user_cascades_to_owned_rows() {
        let store = MemoryStore::default();
        let user = store.seed_user(SocialProvider::Google, "g-123");
        let conversation = store.create_conversation(user.id, Uuid::new_v4()).await.unwrap();
        store
            .save_progress(&Progress::new(user.id))
            .await
            .unwrap();
        store
            .add_minutes(user.id, Utc::now().date_naive(), 3)
            .await
            .unwrap();
        store
            .record_activity(&ConversationAgentActivity {
                id: Uuid::new_v4(),
                conversation_id: conversation.id,
                user_id: user.id,
                agent_id: conversation.agent_id,
                duration_seconds: 90,
                message_count: 1,
                word_count: 3,
                words_per_minute: 2.0,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        assert!(store.rows_owned_by(user.id) > 0);

        store.delete_user(user.id).await.unwrap();
        assert_eq!(store.rows_owned_by(user.id), 0);
        assert!(store.get_conversation(conversation.id).await.is_err());
    }

    #[tokio::test]
    async fn test_duration_and_activity_are_written_once() {
        let store = MemoryStore::default();
        let conversation = store
            .create_conversation(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap();

        assert!(store.set_duration(conversation.id, 600).await.unwrap());
        assert!(!store.set_duration(conversation.id, 4).await.unwrap());
        let stored = store.get_conversation(conversation.id).await.unwrap();
        assert_eq!(stored.duration_seconds, Some(600));

        let activity = ConversationAgentActivity {
            id: Uuid::new_v4(),
            conversation_id: conversation.id,
            user_id: conversation.user_id,
            agent_id: conversation.agent_id,
            duration_seconds: 600,
            message_count: 0,
            word_count: 0,
            words_per_minute: 0.0,
            created_at: Utc::now(),
        };
        assert!(store.record_activity(&activity).await.unwrap());
        let again = ConversationAgentActivity {
            id: Uuid::new_v4(),
            ..activity
        };
        assert!(!store.record_activity(&again).await.unwrap());
        let rows = store
            .list_agent_activity(conversation.user_id, conversation.agent_id)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_agent_with_conversations_cannot_be_deleted() {
        let store = MemoryStore::default();
        let user = store.seed_user(SocialProvider::Apple, "a-1");
        let agent = store
            .create_agent(AgentDraft {
                name: "Guide".to_string(),
                agent_type: AgentType::Travel,
                description: None,
                voice: None,
                persona: "A tour guide in Rome.".to_string(),
            })
            .await
            .unwrap();
        store
            .create_prompt(PromptDraft {
                agent_id: agent.id,
                title: "Scene".to_string(),
                content: "At the Colosseum.".to_string(),
            })
            .await
            .unwrap();
        let conversation = store.create_conversation(user.id, agent.id).await.unwrap();

        let err = store.delete_agent(agent.id).await.unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));
        assert!(store.get_agent(agent.id).await.is_ok());
        assert!(store.get_conversation(conversation.id).await.is_ok());
        assert_eq!(store.list_prompts(agent.id).await.unwrap().len(), 1);

        store.delete_conversation(conversation.id).await.unwrap();
        store.delete_agent(agent.id).await.unwrap();
        assert!(store.list_prompts(agent.id).await.unwrap().is_empty());
        assert!(matches!(
            store.get_agent(agent.id).await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_short_conversation_sweep_keeps_live_and_long_ones() {
        let store = MemoryStore::default();
        let user_id = Uuid::new_v4();
        let agent_id = Uuid::new_v4();
        let short = store.create_conversation(user_id, agent_id).await.unwrap();
        let long = store.create_conversation(user_id, agent_id).await.unwrap();
        let unfinished = store.create_conversation(user_id, agent_id).await.unwrap();
        let live = store.create_conversation(user_id, agent_id).await.unwrap();
        store.set_duration(short.id, 30).await.unwrap();
        store.set_duration(long.id, 600).await.unwrap();

        let cutoff = Utc::now() + chrono::Duration::seconds(1);
        let removed = store
            .delete_short_conversations(cutoff, &[live.id])
            .await
            .unwrap();

        assert_eq!(removed, 2);
        assert!(store.get_conversation(short.id).await.is_err());
        assert!(store.get_conversation(unfinished.id).await.is_err());
        assert!(store.get_conversation(long.id).await.is_ok());
        assert!(store.get_conversation(live.id).await.is_ok());
    }
}
