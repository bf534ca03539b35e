//! OpenAI-compatible chat-completion wire types, shared by the Groq and
//! Novita clients.

use crate::llm::{ChatMessage, ChatResponse};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub stream: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    pub choices: Option<Vec<ChatCompletionChoice>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionChoice {
    pub message: Option<WireMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// First choice's message as a `ChatResponse`. Missing pieces collapse to None.
    pub fn into_chat_response(self) -> ChatResponse {
        let message = self
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message)
            .map(|m| ChatMessage {
                role: m.role.unwrap_or_else(|| "assistant".to_string()),
                content: m.content.unwrap_or_default(),
            });
        ChatResponse { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_completion_response() {
        let raw = r#"{
            "id": "chatcmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "hello there"}, "finish_reason": "stop"}
            ]
        }"#;
        let res: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        let chat = res.into_chat_response();
        assert_eq!(chat.content(), "hello there");
        assert_eq!(chat.message.unwrap().role, "assistant");
    }

    #[test]
    fn empty_choices_yield_no_message() {
        let res: ChatCompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(res.into_chat_response().message.is_none());
    }

    #[test]
    fn missing_content_defaults_to_empty() {
        let raw = r#"{"choices": [{"message": {"role": "assistant"}}]}"#;
        let res: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        let chat = res.into_chat_response();
        assert_eq!(chat.content(), "");
    }
}
