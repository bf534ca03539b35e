//! DeepSeek chat-completion client, served through the Hugging Face router's
//! Novita provider (OpenAI-compatible API, authenticated with an HF token).

use crate::llm::wire::{ChatCompletionRequest, ChatCompletionResponse};
use crate::llm::{ChatBackend, ChatMessage, ChatResponse, LlmError};
use async_trait::async_trait;

const DEFAULT_BASE_URL: &str = "https://router.huggingface.co/novita/v3/openai";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "deepseek-ai/DeepSeek-V3-0324";

const TEMPERATURE: f32 = 0.5;

/// Client for DeepSeek completions via the Hugging Face router (Novita).
#[derive(Clone)]
pub struct NovitaClient {
    base_url: String,
    api_token: String,
    client: reqwest::Client,
}

impl NovitaClient {
    pub fn new(api_token: impl Into<String>, base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            api_token: api_token.into(),
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
            .bearer_auth(&self.api_token)
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
impl ChatBackend for NovitaClient {
    async fn chat(&self, model: &str, messages: Vec<ChatMessage>) -> Result<ChatResponse, LlmError> {
        NovitaClient::chat(self, model, messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base_url() {
        let c = NovitaClient::new("token", None);
        assert_eq!(c.base_url, "https://router.huggingface.co/novita/v3/openai");
    }
}
