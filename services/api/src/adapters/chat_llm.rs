//! services/api/src/adapters/chat_llm.rs
//!
//! This module contains the adapter for the agent's conversational LLM.
//! It implements the `ChatCompletionService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use conversa_core::domain::MessageRole;
use conversa_core::ports::{ChatCompletionService, ChatTurn, PortError, PortResult};
use regex::Regex;
use std::sync::LazyLock;

/// Only this many prior messages are sent back to the model.
const HISTORY_WINDOW: usize = 20;

static CITATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(?\[([^\]]*)\]\([^)]*\)\)?").expect("citation pattern is valid")
});
static EMPHASIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\*\*|__|\*|`)").expect("emphasis pattern is valid"));

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ChatCompletionService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiChatAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiChatAdapter {
    /// Creates a new `OpenAiChatAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    fn build_messages(turn: &ChatTurn) -> PortResult<Vec<ChatCompletionRequestMessage>> {
        let mut messages = Vec::with_capacity(turn.history.len().min(HISTORY_WINDOW) + 2);
        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(turn.system_prompt.as_str())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        );

        let skip = turn.history.len().saturating_sub(HISTORY_WINDOW);
        for message in turn.history.iter().skip(skip) {
            let built: ChatCompletionRequestMessage = match message.role {
                MessageRole::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(message.content.as_str())
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?
                    .into(),
                MessageRole::Ai => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(message.content.as_str())
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?
                    .into(),
            };
            messages.push(built);
        }

        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(turn.user_content.as_str())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        );
        Ok(messages)
    }
}

/// Strips markdown links and emphasis so replies read naturally when spoken.
pub fn clean_reply(text: &str) -> String {
    let without_links = CITATION.replace_all(text, "$1");
    let plain = EMPHASIS.replace_all(&without_links, "");
    plain
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect::<Vec<_>>()
        .join(" ")
}

//=========================================================================================
// `ChatCompletionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatCompletionService for OpenAiChatAdapter {
    async fn reply(&self, turn: &ChatTurn) -> PortResult<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(Self::build_messages(turn)?)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Chat LLM returned no text content.".to_string())
            })?;

        Ok(clean_reply(&content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_keep_their_text_and_emphasis_is_dropped() {
        let raw = "**¡Muy bien!** Mira [esta guía](https://example.com/guia) para *practicar*.";
        assert_eq!(clean_reply(raw), "¡Muy bien! Mira esta guía para practicar.");
    }

    #[test]
    fn headings_and_blank_lines_are_removed() {
        let raw = "## Corrección\n\nSe dice `tengo hambre`.\n\n¿Qué más quieres comer?";
        assert_eq!(
            clean_reply(raw),
            "Se dice tengo hambre. ¿Qué más quieres comer?"
        );
    }
}
