//! Groq chat-completion client (OpenAI-compatible API).

use crate::llm::wire::{ChatCompletionRequest, ChatCompletionResponse};
use crate::llm::{ChatBackend, ChatMessage, ChatResponse, LlmError};
use async_trait::async_trait;

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "llama3-8b-8192";

/// Sampling temperature for support answers; keeps replies close to the catalog.
const TEMPERATURE: f32 = 0.5;

/// Client for the Groq chat-completions API.
#[derive(Clone)]
pub struct GroqClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GroqClient {
    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    /// POST /chat/completions — non-streaming chat completion.
    pub async fn chat(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<ChatResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatCompletionRequest {
            model: model.to_string(),
            messages,
            temperature: TEMPERATURE,
            stream: false,
        };
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let message = res.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, message });
        }
        let data: ChatCompletionResponse = res.json().await?;
        Ok(data.into_chat_response())
    }
}

#[async_trait]
impl ChatBackend for GroqClient {
    async fn chat(&self, model: &str, messages: Vec<ChatMessage>) -> Result<ChatResponse, LlmError> {
        GroqClient::chat(self, model, messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base_url() {
        let c = GroqClient::new("key", None);
        assert_eq!(c.base_url, "https://api.groq.com/openai/v1");
    }

    #[test]
    fn custom_base_url_trailing_slash_trimmed() {
        let c = GroqClient::new("key", Some("http://127.0.0.1:9999/v1/".to_string()));
        assert_eq!(c.base_url, "http://127.0.0.1:9999/v1");
    }
}
