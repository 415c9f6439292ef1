use crate::openai::{ChatMessage, OpenAiClient};
use crate::session_memory::{Role, SessionMemory, Turn};
use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChatError {
    #[error("chat model failed: {0}")]
    Model(String),
    #[error("chat model did not answer within {0:?}")]
    Timeout(Duration),
}

/// Continues a conversation given its full history.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, history: &[Turn]) -> Result<String>;
}

pub struct OpenAiChatModel {
    client: OpenAiClient,
    temperature: f32,
}

impl OpenAiChatModel {
    pub fn new(client: OpenAiClient) -> Self {
        Self {
            client,
            temperature: 0.7,
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, history: &[Turn]) -> Result<String> {
        let messages: Vec<ChatMessage> = history
            .iter()
            .map(|turn| match turn.role {
                Role::User => ChatMessage::user(turn.text.clone()),
                Role::Assistant => ChatMessage::assistant(turn.text.clone()),
            })
            .collect();
        self.client.chat(&messages, self.temperature).await
    }
}

/// Keeps ASCII alphanumerics, whitespace and plain punctuation, then collapses
/// whitespace runs.
pub fn clean_response(text: &str) -> String {
    let kept: String = text
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || ".,?!:;'-\"".contains(*c))
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Free-form mock-interview chat backed by [`SessionMemory`].
///
/// Messages for one session are handled one at a time, so each reply is
/// generated from the history that includes every earlier exchange.
pub struct InterviewChat {
    memory: Arc<SessionMemory>,
    model: Arc<dyn ChatModel>,
    timeout: Duration,
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl InterviewChat {
    pub fn new(memory: Arc<SessionMemory>, model: Arc<dyn ChatModel>, timeout: Duration) -> Self {
        Self {
            memory,
            model,
            timeout,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    fn session_lock(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        // locks nobody is holding or waiting on
        in_flight.retain(|_, lock| Arc::strong_count(lock) > 1);
        in_flight.entry(session_id.to_string()).or_default().clone()
    }

    pub async fn process_message(&self, session_id: &str, message: &str) -> Result<String, ChatError> {
        let session = self.session_lock(session_id);
        let _turn = session.lock().await;

        let mut history = self.memory.get_or_create(session_id);
        history.push(Turn::user(message));

        let reply = tokio::time::timeout(self.timeout, self.model.complete(&history))
            .await
            .map_err(|_| ChatError::Timeout(self.timeout))?
            .map_err(|e| ChatError::Model(format!("{e:#}")))?;

        self.memory.append_turn(session_id, Role::User, message);
        self.memory.append_turn(session_id, Role::Assistant, reply.clone());
        tracing::debug!(session_id, history = history.len(), "Chat reply generated");

        Ok(clean_response(&reply))
    }
}
