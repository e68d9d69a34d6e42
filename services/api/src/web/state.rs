//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use crate::web::relay::{ChatRelay, SessionRegistry};
use crate::web::tokens::TokenIssuer;
use conversa_core::ports::{
    ActivityRepository, AgentRepository, AuthSessionRepository, ChatCompletionService,
    ConversationRepository, DailyActivityRepository, FileStore, IdentityVerifier,
    MessageRepository, ProgressRepository, PromptRepository, TextToSpeechService, UserRepository,
};
use conversa_core::ProgressTracker;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<dyn AuthSessionRepository>,
    pub conversations: Arc<dyn ConversationRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub agents: Arc<dyn AgentRepository>,
    pub prompts: Arc<dyn PromptRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub activity: Arc<dyn ActivityRepository>,
    pub daily: Arc<dyn DailyActivityRepository>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub tts: Arc<dyn TextToSpeechService>,
    pub files: Arc<dyn FileStore>,
    pub tokens: TokenIssuer,
    pub relay: Arc<ChatRelay>,
}

/// Anything that implements every repository port, like the Postgres adapter.
pub trait Repositories:
    UserRepository
    + AuthSessionRepository
    + ConversationRepository
    + MessageRepository
    + AgentRepository
    + PromptRepository
    + ProgressRepository
    + ActivityRepository
    + DailyActivityRepository
    + 'static
{
}

impl<T> Repositories for T where
    T: UserRepository
        + AuthSessionRepository
        + ConversationRepository
        + MessageRepository
        + AgentRepository
        + PromptRepository
        + ProgressRepository
        + ActivityRepository
        + DailyActivityRepository
        + 'static
{
}

/// The external services the state needs besides storage.
pub struct Services {
    pub identity: Arc<dyn IdentityVerifier>,
    pub tts: Arc<dyn TextToSpeechService>,
    pub chat: Arc<dyn ChatCompletionService>,
    pub files: Arc<dyn FileStore>,
}

impl AppState {
    /// Wires every port to `store` and builds the tracker and relay on top of it.
    pub fn new<R: Repositories>(config: Arc<Config>, store: Arc<R>, services: Services) -> Self {
        let tracker = ProgressTracker::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
        );
        let relay = Arc::new(ChatRelay::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            services.chat,
            tracker,
            Arc::new(SessionRegistry::new()),
        ));
        let tokens = TokenIssuer::new(&config.jwt_secret, config.access_token_ttl);

        Self {
            config,
            users: store.clone(),
            sessions: store.clone(),
            conversations: store.clone(),
            messages: store.clone(),
            agents: store.clone(),
            prompts: store.clone(),
            progress: store.clone(),
            activity: store.clone(),
            daily: store,
            identity: services.identity,
            tts: services.tts,
            files: services.files,
            tokens,
            relay,
        }
    }
}
