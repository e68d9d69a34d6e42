//! services/api/src/web/relay/protocol.rs
//!
//! Defines the WebSocket message protocol between a learner's client and the
//! conversation relay.

use crate::web::rest::messages::MessageResponse;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client TO the Server
//=========================================================================================
// NOTE: Ids arrive as strings and are validated by the relay, so a blank or malformed
// id produces an `error` event instead of a dropped frame.
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A learner utterance for the agent. The reply is broadcast to the conversation.
    SendMessage {
        #[serde(default)]
        conversation_id: String,
        #[serde(default)]
        user_id: String,
        #[serde(default)]
        agent_id: String,
        #[serde(default)]
        content: String,
    },

    /// Asks how long the conversation's live session has been running.
    GetConversationDuration {
        #[serde(default)]
        conversation_id: String,
    },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Confirms the socket joined the conversation and its timer is running.
    Connected { conversation_id: Uuid },

    /// A persisted message, from either the learner or the agent.
    ReceiveMessage { message: MessageResponse },

    /// Answer to `get_conversation_duration`, sent to the asking socket only.
    ConversationDuration { conversation_id: Uuid, seconds: i64 },

    /// The live session ended and its duration was recorded.
    ConversationEnded {
        conversation_id: Uuid,
        duration_seconds: i64,
    },

    /// Reports a failure to the socket that caused it.
    Error { message: String },
}
