//! services/api/src/web/relay/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! One socket is joined to one conversation for its whole lifetime.

use super::protocol::{ClientMessage, ServerEvent};
use super::service::{ChatRelay, ConnectParams, SendMessage};
use crate::web::response::AppQuery;
use crate::web::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub conversation_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
}

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    AppQuery(query): AppQuery<ConnectQuery>,
) -> Response {
    let params = ConnectParams {
        conversation_id: query.conversation_id,
        agent_id: query.agent_id,
    };
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, user_id, params))
}

async fn send_event<S>(sender: &mut S, event: &ServerEvent) -> bool
where
    S: SinkExt<Message> + Unpin,
{
    match serde_json::to_string(event) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            error!("Failed to serialize server event: {}", e);
            true
        }
    }
}

async fn handle_socket(
    socket: WebSocket,
    app_state: Arc<AppState>,
    user_id: Uuid,
    params: ConnectParams,
) {
    let (mut sender, mut receiver) = socket.split();
    let relay = app_state.relay.clone();

    // --- 1. Join Phase ---
    let connection = match relay.connect(user_id, params).await {
        Ok(connection) => connection,
        Err(e) => {
            warn!(%user_id, "Rejected socket: {}", e);
            let _ = send_event(&mut sender, &e.to_event()).await;
            return;
        }
    };
    let conversation_id = connection.conversation.id;
    let mut events = connection.events;

    let connected = ServerEvent::Connected { conversation_id };
    if send_event(&mut sender, &connected).await {
        // --- 2. Main Message Loop ---
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => {
                        if !send_event(&mut sender, &event).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(%conversation_id, skipped, "Socket lagged behind its conversation");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },

                incoming = receiver.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_text_message(&relay, user_id, &text).await {
                            if !send_event(&mut sender, &reply).await {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!(%conversation_id, "Client disconnected.");
                        break;
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket receive error: {}", e);
                        break;
                    }
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    // --- 3. Cleanup ---
    drop(events);
    relay.disconnect(conversation_id).await;
    info!(%conversation_id, "WebSocket connection closed.");
}

/// Runs one client message. Returns the event meant for this socket only, if any.
async fn handle_text_message(relay: &ChatRelay, user_id: Uuid, text: &str) -> Option<ServerEvent> {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            return Some(ServerEvent::Error {
                message: "Unrecognized message".to_string(),
            });
        }
    };

    let outcome = match message {
        ClientMessage::SendMessage {
            conversation_id,
            user_id: claimed_user,
            agent_id,
            content,
        } => relay
            .send_message(
                user_id,
                SendMessage {
                    conversation_id,
                    user_id: claimed_user,
                    agent_id,
                    content,
                },
            )
            .await
            .map(|()| None),
        ClientMessage::GetConversationDuration { conversation_id } => relay
            .conversation_duration(user_id, &conversation_id)
            .await
            .map(Some),
    };

    outcome.unwrap_or_else(|e| Some(e.to_event()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::relay::SessionRegistry;
    use async_trait::async_trait;
    use conversa_core::domain::{AgentDraft, AgentType, SocialProvider};
    use conversa_core::ports::{
        AgentRepository, ChatCompletionService, ChatTurn, MessageRepository, PortResult,
    };
    use conversa_core::testing::MemoryStore;
    use conversa_core::ProgressTracker;
    use serde_json::json;

    struct Parrot;

    #[async_trait]
    impl ChatCompletionService for Parrot {
        async fn reply(&self, turn: &ChatTurn) -> PortResult<String> {
            Ok(turn.user_content.clone())
        }
    }

    async fn relay_with_agent() -> (Arc<MemoryStore>, ChatRelay, Uuid, Uuid) {
        let store = Arc::new(MemoryStore::default());
        let user = store.seed_user(SocialProvider::Google, "socket-user");
        let agent = store
            .create_agent(AgentDraft {
                name: "Tomo".to_string(),
                agent_type: AgentType::Conversation,
                description: None,
                voice: None,
                persona: "You chat about weekend plans.".to_string(),
            })
            .await
            .unwrap();
        let tracker =
            ProgressTracker::new(store.clone(), store.clone(), store.clone(), store.clone());
        let relay = ChatRelay::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(Parrot),
            tracker,
            Arc::new(SessionRegistry::new()),
        );
        (store, relay, user.id, agent.id)
    }

    #[tokio::test]
    async fn test_unparseable_frame_answers_with_an_error() {
        let (_store, relay, user_id, _agent_id) = relay_with_agent().await;

        for frame in ["not json", r#"{"type":"dance"}"#] {
            match handle_text_message(&relay, user_id, frame).await {
                Some(ServerEvent::Error { message }) => {
                    assert_eq!(message, "Unrecognized message")
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_duration_request_is_answered_to_the_caller_only() {
        let (_store, relay, user_id, agent_id) = relay_with_agent().await;
        let mut connection = relay
            .connect(
                user_id,
                ConnectParams {
                    conversation_id: None,
                    agent_id: Some(agent_id),
                },
            )
            .await
            .unwrap();
        let id = connection.conversation.id;

        let frame = json!({"type": "get_conversation_duration", "conversation_id": id}).to_string();
        match handle_text_message(&relay, user_id, &frame).await {
            Some(ServerEvent::ConversationDuration {
                conversation_id,
                seconds,
            }) => {
                assert_eq!(conversation_id, id);
                assert!(seconds >= 0);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            connection.events.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_send_message_replies_through_the_group() {
        let (store, relay, user_id, agent_id) = relay_with_agent().await;
        let mut connection = relay
            .connect(
                user_id,
                ConnectParams {
                    conversation_id: None,
                    agent_id: Some(agent_id),
                },
            )
            .await
            .unwrap();
        let id = connection.conversation.id;

        let frame = json!({
            "type": "send_message",
            "conversation_id": id,
            "user_id": user_id,
            "agent_id": agent_id,
            "content": "Hello there",
        })
        .to_string();
        assert!(handle_text_message(&relay, user_id, &frame).await.is_none());

        for _ in 0..2 {
            assert!(matches!(
                connection.events.recv().await.unwrap(),
                ServerEvent::ReceiveMessage { .. }
            ));
        }
        assert_eq!(store.list_messages(id).await.unwrap().len(), 2);
    }
}
