pub mod activity;
pub mod domain;
pub mod ports;
pub mod progress;
pub mod tracker;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use activity::{AgentStats, DayActivity, WeeklyReport};
pub use domain::{
    Agent, AgentDraft, AgentType, AuthSession, CefrLevel, Conversation, ConversationAgentActivity,
    Message, MessageRole, NewMessage, NewUser, Progress, Prompt, PromptDraft, SocialProvider,
    StoredFile, User, UserDailyActivity, UserProfile, VerifiedIdentity,
};
pub use ports::{
    ActivityRepository, AgentRepository, AuthSessionRepository, ChatCompletionService, ChatTurn,
    ConversationRepository, DailyActivityRepository, FileStore, IdentityVerifier,
    MessageRepository, PortError, PortResult, ProgressRepository, PromptRepository,
    TextToSpeechService, UserRepository,
};
pub use tracker::ProgressTracker;
