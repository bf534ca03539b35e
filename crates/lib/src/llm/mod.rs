//! LLM provider clients.
//!
//! Two hosted chat-completion backends (Groq, and DeepSeek through the Hugging
//! Face router's Novita provider) behind the `ChatBackend` trait. Both speak
//! the OpenAI-compatible dialect; the shared wire types live in `wire`.

pub mod groq;
pub mod novita;
mod wire;

pub use groq::GroqClient;
pub use novita::NovitaClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single role-tagged message in a chat exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

/// Completion result: the assistant message, when the provider returned one.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub message: Option<ChatMessage>,
}

impl ChatResponse {
    /// Text content of the assistant message, if any.
    pub fn content(&self) -> &str {
        self.message
            .as_ref()
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("provider request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("provider api error: {status} {message}")]
    Api { status: u16, message: String },
}

/// A chat-completion backend: ordered role-tagged messages in, one assistant message out.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(&self, model: &str, messages: Vec<ChatMessage>) -> Result<ChatResponse, LlmError>;
}
