//! services/api/src/web/relay/service.rs
//!
//! The conversation relay: joins sockets to a conversation, times the live session,
//! relays learner messages to the agent's chat model and records the session when
//! it ends. Independent of the socket itself so it can be driven from tests.

use super::hub::RelayHub;
use super::protocol::ServerEvent;
use super::registry::SessionRegistry;
use crate::web::rest::messages::MessageResponse;
use chrono::Utc;
use conversa_core::domain::{Agent, Conversation, MessageRole, NewMessage, Prompt};
use conversa_core::ports::{
    AgentRepository, ChatCompletionService, ChatTurn, ConversationRepository, MessageRepository,
    PortError, PromptRepository,
};
use conversa_core::ProgressTracker;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use uuid::Uuid;

const GENERIC_FAILURE: &str = "Something went wrong, please try again";

//=========================================================================================
// Errors and Parameters
//=========================================================================================

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Port(#[from] PortError),
}

impl RelayError {
    /// The event sent back to the socket that caused the error.
    pub fn to_event(&self) -> ServerEvent {
        let message = match self {
            RelayError::Validation(why) => why.clone(),
            RelayError::Port(PortError::NotFound(what)) => what.clone(),
            RelayError::Port(PortError::Validation(why)) => why.clone(),
            RelayError::Port(PortError::Unauthorized) => "Unauthorized".to_string(),
            RelayError::Port(PortError::Unexpected(detail)) => {
                error!("Relay operation failed: {}", detail);
                GENERIC_FAILURE.to_string()
            }
        };
        ServerEvent::Error { message }
    }
}

/// Which conversation a socket wants: an existing one, or a new one with an agent.
#[derive(Debug, Clone, Default)]
pub struct ConnectParams {
    pub conversation_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
}

/// A learner message as it arrives over the socket.
#[derive(Debug, Clone)]
pub struct SendMessage {
    pub conversation_id: String,
    pub user_id: String,
    pub agent_id: String,
    pub content: String,
}

/// A joined socket: the conversation plus its feed of group events.
pub struct Connection {
    pub conversation: Conversation,
    pub events: broadcast::Receiver<ServerEvent>,
}

fn parse_id(field: &str, raw: &str) -> Result<Uuid, RelayError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(RelayError::Validation(format!("{} is required", field)));
    }
    Uuid::parse_str(raw).map_err(|_| RelayError::Validation(format!("{} is not a valid id", field)))
}

/// The agent's persona followed by its scenario prompts.
pub fn compose_system_prompt(agent: &Agent, prompts: &[Prompt]) -> String {
    let mut system = agent.persona.trim().to_string();
    for prompt in prompts {
        system.push_str("\n\n");
        system.push_str(prompt.title.trim());
        system.push_str(":\n");
        system.push_str(prompt.content.trim());
    }
    system
}

//=========================================================================================
// ChatRelay
//=========================================================================================

pub struct ChatRelay {
    conversations: Arc<dyn ConversationRepository>,
    messages: Arc<dyn MessageRepository>,
    agents: Arc<dyn AgentRepository>,
    prompts: Arc<dyn PromptRepository>,
    chat: Arc<dyn ChatCompletionService>,
    tracker: ProgressTracker,
    registry: Arc<SessionRegistry>,
    hub: RelayHub,
}

impl ChatRelay {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        messages: Arc<dyn MessageRepository>,
        agents: Arc<dyn AgentRepository>,
        prompts: Arc<dyn PromptRepository>,
        chat: Arc<dyn ChatCompletionService>,
        tracker: ProgressTracker,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            conversations,
            messages,
            agents,
            prompts,
            chat,
            tracker,
            registry,
            hub: RelayHub::new(),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn hub(&self) -> &RelayHub {
        &self.hub
    }

    /// Resolves or creates the conversation, joins its group and starts its timer.
    pub async fn connect(
        &self,
        user_id: Uuid,
        params: ConnectParams,
    ) -> Result<Connection, RelayError> {
        let conversation = match (params.conversation_id, params.agent_id) {
            (Some(conversation_id), _) => self.owned_conversation(user_id, conversation_id).await?,
            (None, Some(agent_id)) => {
                self.agents.get_agent(agent_id).await?;
                self.conversations
                    .create_conversation(user_id, agent_id)
                    .await?
            }
            (None, None) => {
                return Err(RelayError::Validation(
                    "conversation_id or agent_id is required".to_string(),
                ))
            }
        };

        let events = self.hub.join(conversation.id);
        self.registry.start(conversation.id);
        info!(
            conversation_id = %conversation.id,
            %user_id,
            "Socket joined conversation"
        );
        Ok(Connection {
            conversation,
            events,
        })
    }

    async fn owned_conversation(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<Conversation, RelayError> {
        let conversation = self.conversations.get_conversation(conversation_id).await?;
        if conversation.user_id != user_id {
            return Err(PortError::NotFound(format!(
                "Conversation {} not found",
                conversation_id
            ))
            .into());
        }
        Ok(conversation)
    }

    /// Persists the learner's message, asks the agent for a reply and broadcasts both.
    pub async fn send_message(
        &self,
        caller_id: Uuid,
        message: SendMessage,
    ) -> Result<(), RelayError> {
        let conversation_id = parse_id("conversation_id", &message.conversation_id)?;
        let user_id = parse_id("user_id", &message.user_id)?;
        let agent_id = parse_id("agent_id", &message.agent_id)?;
        let content = message.content.trim();
        if content.is_empty() {
            return Err(RelayError::Validation("content is required".to_string()));
        }
        if user_id != caller_id {
            return Err(PortError::Unauthorized.into());
        }

        let conversation = self.owned_conversation(caller_id, conversation_id).await?;
        if conversation.agent_id != agent_id {
            return Err(RelayError::Validation(
                "agent_id does not match the conversation".to_string(),
            ));
        }

        let sent = self
            .messages
            .create_message(NewMessage {
                conversation_id,
                role: MessageRole::User,
                content: content.to_string(),
                audio_url: None,
            })
            .await?;
        self.hub.broadcast(
            conversation_id,
            ServerEvent::ReceiveMessage {
                message: MessageResponse::from(sent.clone()),
            },
        );

        let agent = self.agents.get_agent(agent_id).await?;
        let prompts = self.prompts.list_prompts(agent_id).await?;
        let history = self
            .messages
            .list_messages(conversation_id)
            .await?
            .into_iter()
            .filter(|m| m.id != sent.id)
            .collect();

        let turn = ChatTurn {
            system_prompt: compose_system_prompt(&agent, &prompts),
            history,
            user_content: sent.content,
        };
        let reply = self.chat.reply(&turn).await?;

        let answer = self
            .messages
            .create_message(NewMessage {
                conversation_id,
                role: MessageRole::Ai,
                content: reply,
                audio_url: None,
            })
            .await?;
        self.hub.broadcast(
            conversation_id,
            ServerEvent::ReceiveMessage {
                message: MessageResponse::from(answer),
            },
        );
        Ok(())
    }

    /// Seconds the caller's live session has run so far; zero when nothing is running.
    pub async fn conversation_duration(
        &self,
        caller_id: Uuid,
        conversation_id: &str,
    ) -> Result<ServerEvent, RelayError> {
        let conversation_id = parse_id("conversation_id", conversation_id)?;
        self.owned_conversation(caller_id, conversation_id).await?;
        let seconds = self
            .registry
            .elapsed(conversation_id)
            .map(|elapsed| elapsed.as_secs() as i64)
            .unwrap_or(0);
        Ok(ServerEvent::ConversationDuration {
            conversation_id,
            seconds,
        })
    }

    /// Ends the live session and tells the remaining members. The first session to
    /// end a conversation stores its duration and hands it to the progress tracker;
    /// later sessions (reconnects) leave both untouched. Call after dropping the
    /// leaving socket's receiver.
    pub async fn disconnect(&self, conversation_id: Uuid) -> Option<i64> {
        let Some(elapsed) = self.registry.stop(conversation_id) else {
            self.hub.leave(conversation_id);
            return None;
        };
        let duration_seconds = elapsed.as_secs() as i64;

        let first_end = match self
            .conversations
            .set_duration(conversation_id, duration_seconds)
            .await
        {
            Ok(true) => true,
            Ok(false) => {
                info!(%conversation_id, "Conversation already ended once, keeping its duration");
                false
            }
            Err(PortError::NotFound(_)) => {
                warn!(%conversation_id, "Conversation was deleted before its session ended");
                false
            }
            Err(e) => {
                error!(%conversation_id, "Failed to store conversation duration: {}", e);
                false
            }
        };

        self.hub.broadcast(
            conversation_id,
            ServerEvent::ConversationEnded {
                conversation_id,
                duration_seconds,
            },
        );
        self.hub.leave(conversation_id);
        info!(%conversation_id, duration_seconds, "Conversation session ended");

        if !first_end {
            return Some(duration_seconds);
        }
        match self.conversations.get_conversation(conversation_id).await {
            Ok(conversation) => {
                let tracker = self.tracker.clone();
                tokio::spawn(async move {
                    let today = Utc::now().date_naive();
                    if let Err(e) = tracker
                        .record_conversation_end(&conversation, duration_seconds, today)
                        .await
                    {
                        error!(
                            conversation_id = %conversation.id,
                            "Failed to record conversation progress: {}", e
                        );
                    }
                });
            }
            Err(e) => warn!(%conversation_id, "Skipping progress update: {}", e),
        }
        Some(duration_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use conversa_core::domain::{AgentDraft, AgentType, Progress, PromptDraft, SocialProvider, User};
    use conversa_core::ports::{
        ActivityRepository, DailyActivityRepository, PortResult, ProgressRepository,
        UserRepository,
    };
    use conversa_core::testing::MemoryStore;
    use std::sync::Mutex;

    /// Echoes the learner and remembers the system prompt it was given.
    #[derive(Default)]
    struct EchoChat {
        seen: Mutex<Vec<ChatTurn>>,
    }

    #[async_trait]
    impl ChatCompletionService for EchoChat {
        async fn reply(&self, turn: &ChatTurn) -> PortResult<String> {
            self.seen.lock().unwrap().push(turn.clone());
            Ok(format!("You said: {}", turn.user_content))
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        chat: Arc<EchoChat>,
        relay: ChatRelay,
        user: User,
        agent: Agent,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::default());
        let chat = Arc::new(EchoChat::default());
        let user = store.seed_user(SocialProvider::Google, "learner-1");
        let agent = store
            .create_agent(AgentDraft {
                name: "Lucia".to_string(),
                agent_type: AgentType::Travel,
                description: None,
                voice: None,
                persona: "You are Lucia, a friendly guide in Madrid.".to_string(),
            })
            .await
            .unwrap();
        store
            .create_prompt(PromptDraft {
                agent_id: agent.id,
                title: "Scenario".to_string(),
                content: "Help the learner order tapas.".to_string(),
            })
            .await
            .unwrap();

        let tracker = ProgressTracker::new(store.clone(), store.clone(), store.clone(), store.clone());
        let relay = ChatRelay::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            chat.clone(),
            tracker,
            Arc::new(SessionRegistry::new()),
        );
        Fixture {
            store,
            chat,
            relay,
            user,
            agent,
        }
    }

    fn message_for(fx: &Fixture, conversation_id: Uuid, content: &str) -> SendMessage {
        SendMessage {
            conversation_id: conversation_id.to_string(),
            user_id: fx.user.id.to_string(),
            agent_id: fx.agent.id.to_string(),
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn test_connect_with_agent_creates_a_timed_conversation() {
        let fx = fixture().await;
        let connection = fx
            .relay
            .connect(
                fx.user.id,
                ConnectParams {
                    conversation_id: None,
                    agent_id: Some(fx.agent.id),
                },
            )
            .await
            .unwrap();

        assert_eq!(connection.conversation.user_id, fx.user.id);
        assert_eq!(
            fx.relay.registry().active_ids(),
            vec![connection.conversation.id]
        );
    }

    #[tokio::test]
    async fn test_connect_to_someone_elses_conversation_is_not_found() {
        let fx = fixture().await;
        let other = fx.store.seed_user(SocialProvider::Apple, "someone-else");
        let theirs = fx
            .store
            .create_conversation(other.id, fx.agent.id)
            .await
            .unwrap();

        let result = fx
            .relay
            .connect(
                fx.user.id,
                ConnectParams {
                    conversation_id: Some(theirs.id),
                    agent_id: None,
                },
            )
            .await;
        assert!(matches!(result, Err(RelayError::Port(PortError::NotFound(_)))));
        assert!(fx.relay.registry().active_ids().is_empty());
    }

    #[tokio::test]
    async fn test_send_message_broadcasts_learner_and_agent_messages() {
        let fx = fixture().await;
        let mut connection = fx
            .relay
            .connect(
                fx.user.id,
                ConnectParams {
                    conversation_id: None,
                    agent_id: Some(fx.agent.id),
                },
            )
            .await
            .unwrap();
        let id = connection.conversation.id;

        fx.relay
            .send_message(fx.user.id, message_for(&fx, id, "  Una caña, por favor "))
            .await
            .unwrap();

        let mut roles = Vec::new();
        for _ in 0..2 {
            match connection.events.recv().await.unwrap() {
                ServerEvent::ReceiveMessage { message } => roles.push((message.role, message.content)),
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(roles[0], (MessageRole::User, "Una caña, por favor".to_string()));
        assert_eq!(
            roles[1],
            (MessageRole::Ai, "You said: Una caña, por favor".to_string())
        );

        let seen = fx.chat.seen.lock().unwrap();
        assert!(seen[0].system_prompt.starts_with("You are Lucia"));
        assert!(seen[0].system_prompt.contains("order tapas"));
        assert!(seen[0].history.is_empty());
    }

    #[tokio::test]
    async fn test_empty_agent_id_is_an_error_without_broadcast() {
        let fx = fixture().await;
        let mut connection = fx
            .relay
            .connect(
                fx.user.id,
                ConnectParams {
                    conversation_id: None,
                    agent_id: Some(fx.agent.id),
                },
            )
            .await
            .unwrap();
        let id = connection.conversation.id;

        let mut message = message_for(&fx, id, "Hola");
        message.agent_id = String::new();
        let err = fx.relay.send_message(fx.user.id, message).await.unwrap_err();

        match err.to_event() {
            ServerEvent::Error { message } => assert_eq!(message, "agent_id is required"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            connection.events.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
        assert!(fx.store.list_messages(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_messages_for_another_user_are_rejected() {
        let fx = fixture().await;
        let connection = fx
            .relay
            .connect(
                fx.user.id,
                ConnectParams {
                    conversation_id: None,
                    agent_id: Some(fx.agent.id),
                },
            )
            .await
            .unwrap();

        let mut message = message_for(&fx, connection.conversation.id, "Hola");
        message.user_id = Uuid::new_v4().to_string();
        let err = fx.relay.send_message(fx.user.id, message).await.unwrap_err();
        assert!(matches!(err, RelayError::Port(PortError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_disconnect_persists_duration_and_notifies_members() {
        let fx = fixture().await;
        let leaving = fx
            .relay
            .connect(
                fx.user.id,
                ConnectParams {
                    conversation_id: None,
                    agent_id: Some(fx.agent.id),
                },
            )
            .await
            .unwrap();
        let id = leaving.conversation.id;
        let mut watcher = fx.relay.hub().join(id);

        drop(leaving.events);
        let duration = fx.relay.disconnect(id).await.unwrap();
        assert!(duration >= 0);

        match watcher.recv().await.unwrap() {
            ServerEvent::ConversationEnded {
                conversation_id,
                duration_seconds,
            } => {
                assert_eq!(conversation_id, id);
                assert_eq!(duration_seconds, duration);
            }
            other => panic!("unexpected {:?}", other),
        }

        let stored = fx.store.get_conversation(id).await.unwrap();
        assert_eq!(stored.duration_seconds, Some(duration));
        assert!(fx.relay.registry().active_ids().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_without_a_running_timer_is_a_no_op() {
        let fx = fixture().await;
        assert_eq!(fx.relay.disconnect(Uuid::new_v4()).await, None);
    }

    #[tokio::test]
    async fn test_disconnect_tolerates_a_deleted_conversation() {
        let fx = fixture().await;
        let connection = fx
            .relay
            .connect(
                fx.user.id,
                ConnectParams {
                    conversation_id: None,
                    agent_id: Some(fx.agent.id),
                },
            )
            .await
            .unwrap();
        let id = connection.conversation.id;
        fx.store.delete_user(fx.user.id).await.unwrap();

        drop(connection.events);
        assert!(fx.relay.disconnect(id).await.is_some());
    }

    #[tokio::test]
    async fn test_duration_of_an_idle_conversation_is_zero() {
        let fx = fixture().await;
        let idle = fx
            .store
            .create_conversation(fx.user.id, fx.agent.id)
            .await
            .unwrap();
        match fx
            .relay
            .conversation_duration(fx.user.id, &idle.id.to_string())
            .await
            .unwrap()
        {
            ServerEvent::ConversationDuration {
                conversation_id,
                seconds,
            } => {
                assert_eq!(conversation_id, idle.id);
                assert_eq!(seconds, 0);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(fx.relay.conversation_duration(fx.user.id, "").await.is_err());
    }

    #[tokio::test]
    async fn test_duration_of_someone_elses_conversation_is_not_found() {
        let fx = fixture().await;
        let other = fx.store.seed_user(SocialProvider::Apple, "someone-else");
        let theirs = fx
            .relay
            .connect(
                other.id,
                ConnectParams {
                    conversation_id: None,
                    agent_id: Some(fx.agent.id),
                },
            )
            .await
            .unwrap();

        let result = fx
            .relay
            .conversation_duration(fx.user.id, &theirs.conversation.id.to_string())
            .await;
        assert!(matches!(result, Err(RelayError::Port(PortError::NotFound(_)))));
    }

    /// Waits for the spawned tracker to write the user's progress.
    async fn wait_for_progress(store: &MemoryStore, user_id: Uuid) -> Progress {
        for _ in 0..100 {
            if let Some(progress) = store.get_progress(user_id).await.unwrap() {
                return progress;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("progress was never recorded");
    }

    #[tokio::test]
    async fn test_disconnect_records_progress() {
        let fx = fixture().await;
        let connection = fx
            .relay
            .connect(
                fx.user.id,
                ConnectParams {
                    conversation_id: None,
                    agent_id: Some(fx.agent.id),
                },
            )
            .await
            .unwrap();
        let id = connection.conversation.id;
        fx.relay
            .send_message(fx.user.id, message_for(&fx, id, "quiero dos tapas"))
            .await
            .unwrap();

        drop(connection.events);
        fx.relay.disconnect(id).await.unwrap();

        let progress = wait_for_progress(&fx.store, fx.user.id).await;
        assert_eq!(progress.daily_conversation_count, 1);
        assert_eq!(progress.current_streak_days, 1);

        let activity = fx
            .store
            .list_agent_activity(fx.user.id, fx.agent.id)
            .await
            .unwrap();
        assert_eq!(activity.len(), 1);
        assert_eq!(activity[0].conversation_id, id);
        assert_eq!(activity[0].message_count, 1);
        assert_eq!(activity[0].word_count, 3);

        let today = Utc::now().date_naive();
        let daily = fx
            .store
            .list_daily_activity(fx.user.id, today, today)
            .await
            .unwrap();
        assert_eq!(daily.len(), 1);
    }

    #[tokio::test]
    async fn test_reconnect_keeps_the_first_duration_and_counts_once() {
        let fx = fixture().await;
        let first = fx
            .relay
            .connect(
                fx.user.id,
                ConnectParams {
                    conversation_id: None,
                    agent_id: Some(fx.agent.id),
                },
            )
            .await
            .unwrap();
        let id = first.conversation.id;
        drop(first.events);
        let first_duration = fx.relay.disconnect(id).await.unwrap();
        wait_for_progress(&fx.store, fx.user.id).await;

        let second = fx
            .relay
            .connect(
                fx.user.id,
                ConnectParams {
                    conversation_id: Some(id),
                    agent_id: None,
                },
            )
            .await
            .unwrap();
        drop(second.events);
        assert!(fx.relay.disconnect(id).await.is_some());
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let stored = fx.store.get_conversation(id).await.unwrap();
        assert_eq!(stored.duration_seconds, Some(first_duration));
        let activity = fx
            .store
            .list_agent_activity(fx.user.id, fx.agent.id)
            .await
            .unwrap();
        assert_eq!(activity.len(), 1);
        let progress = fx.store.get_progress(fx.user.id).await.unwrap().unwrap();
        assert_eq!(progress.daily_conversation_count, 1);
    }

    #[tokio::test]
    async fn test_brief_reconnect_does_not_shorten_a_long_conversation() {
        let fx = fixture().await;
        let long = fx
            .store
            .create_conversation(fx.user.id, fx.agent.id)
            .await
            .unwrap();
        fx.store.set_duration(long.id, 600).await.unwrap();

        let connection = fx
            .relay
            .connect(
                fx.user.id,
                ConnectParams {
                    conversation_id: Some(long.id),
                    agent_id: None,
                },
            )
            .await
            .unwrap();
        drop(connection.events);
        fx.relay.disconnect(long.id).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let stored = fx.store.get_conversation(long.id).await.unwrap();
        assert_eq!(stored.duration_seconds, Some(600));
        assert!(fx
            .store
            .list_agent_activity(fx.user.id, fx.agent.id)
            .await
            .unwrap()
            .is_empty());
        assert!(fx.store.get_progress(fx.user.id).await.unwrap().is_none());
    }
}
