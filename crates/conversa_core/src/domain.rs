//! crates/conversa_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or transport format; the small
//! enums carry serde derives so the web layer can expose them directly.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Enumerations
//=========================================================================================

/// The third-party identity provider a user signed in with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocialProvider {
    Google,
    Apple,
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Ai,
}

/// The kind of persona an agent plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Conversation,
    Travel,
    Business,
    Grammar,
}

/// CEFR-like proficiency tier, ordered from beginner to mastery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CefrLevel {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

/// Returned when a stored or submitted code does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $code:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $code,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($code => Ok($ty::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

string_enum!(SocialProvider, "social provider", { Google => "google", Apple => "apple" });
string_enum!(MessageRole, "message role", { User => "user", Ai => "ai" });
string_enum!(AgentType, "agent type", {
    Conversation => "conversation",
    Travel => "travel",
    Business => "business",
    Grammar => "grammar",
});
string_enum!(CefrLevel, "level", {
    A1 => "A1",
    A2 => "A2",
    B1 => "B1",
    B2 => "B2",
    C1 => "C1",
    C2 => "C2",
});

//=========================================================================================
// Users and Auth
//=========================================================================================

/// Learner profile fields, all optional until the user fills them in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfile {
    pub native_language: Option<String>,
    pub target_language: Option<String>,
    pub proficiency: Option<String>,
    pub age_range: Option<String>,
    pub learning_goals: Vec<String>,
}

/// Represents a user - the root aggregate everything else hangs off.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub provider: SocialProvider,
    pub social_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub profile: UserProfile,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Data needed to create a user on first social login.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub provider: SocialProvider,
    pub social_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// The identity asserted by a verified third-party token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub provider: SocialProvider,
    pub social_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

// Represents a refresh-token session; the secret itself is never stored
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub refresh_token_hash: String,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl AuthSession {
    /// A session can be refreshed while it is neither revoked nor expired.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

//=========================================================================================
// Agents and Prompts
//=========================================================================================

/// A configured AI persona a user converses with.
#[derive(Debug, Clone)]
pub struct Agent {
    pub id: Uuid,
    pub name: String,
    pub agent_type: AgentType,
    pub description: Option<String>,
    pub voice: Option<String>,
    pub persona: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AgentDraft {
    pub name: String,
    pub agent_type: AgentType,
    pub description: Option<String>,
    pub voice: Option<String>,
    pub persona: String,
}

/// An instruction block attached to an agent's system prompt.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PromptDraft {
    pub agent_id: Uuid,
    pub title: String,
    pub content: String,
}

//=========================================================================================
// Conversations and Messages
//=========================================================================================

/// A single chat session between a user and an agent.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub agent_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub summary: Option<String>,
    /// Set once, when the live session ends.
    pub duration_seconds: Option<i64>,
}

/// A single utterance within a conversation.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub audio_url: Option<String>,
    pub corrected_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub audio_url: Option<String>,
}

//=========================================================================================
// Progress and Activity
//=========================================================================================

/// Per-user learning progress. Recomputed by the progress engine, never set directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub user_id: Uuid,
    pub total_conversation_minutes: i64,
    pub daily_conversation_count: i64,
    pub current_streak_days: i32,
    pub longest_streak_days: i32,
    pub last_conversation_date: Option<NaiveDate>,
    pub current_level: CefrLevel,
    pub updated_at: DateTime<Utc>,
}

impl Progress {
    /// A blank record for a user who has not finished a conversation yet.
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            total_conversation_minutes: 0,
            daily_conversation_count: 0,
            current_streak_days: 0,
            longest_streak_days: 0,
            last_conversation_date: None,
            current_level: CefrLevel::A1,
            updated_at: Utc::now(),
        }
    }
}

/// Activity figures captured once, when a conversation ends.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationAgentActivity {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub agent_id: Uuid,
    pub duration_seconds: i64,
    pub message_count: i64,
    pub word_count: i64,
    pub words_per_minute: f64,
    pub created_at: DateTime<Utc>,
}

/// Minutes spoken by one user on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDailyActivity {
    pub user_id: Uuid,
    pub activity_date: NaiveDate,
    pub minutes_spoken: i64,
}

/// A file written by the file store and reachable under a public URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub name: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_codes_round_trip_through_from_str() {
        assert_eq!("apple".parse::<SocialProvider>().unwrap(), SocialProvider::Apple);
        assert_eq!(MessageRole::Ai.to_string(), "ai");
        assert_eq!("grammar".parse::<AgentType>().unwrap(), AgentType::Grammar);
        assert_eq!("B2".parse::<CefrLevel>().unwrap(), CefrLevel::B2);
    }

    #[test]
    fn unknown_codes_are_rejected() {
        let err = "facebook".parse::<SocialProvider>().unwrap_err();
        assert_eq!(err.value, "facebook");
        assert!("b2".parse::<CefrLevel>().is_err());
    }

    #[test]
    fn revoked_or_expired_sessions_are_inactive() {
        let now = Utc::now();
        let mut session = AuthSession {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            refresh_token_hash: String::new(),
            user_agent: None,
            created_at: now,
            expires_at: now + chrono::Duration::days(1),
            revoked_at: None,
        };
        assert!(session.is_active(now));

        session.revoked_at = Some(now);
        assert!(!session.is_active(now));

        session.revoked_at = None;
        session.expires_at = now - chrono::Duration::seconds(1);
        assert!(!session.is_active(now));
    }
}
