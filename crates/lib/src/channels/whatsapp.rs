//! WhatsApp Cloud API: outbound text messages via the Graph API, and the
//! inbound webhook payload shape.

use serde::Deserialize;
use serde_json::json;

const GRAPH_API_BASE: &str = "https://graph.facebook.com/v19.0";

#[derive(Debug, thiserror::Error)]
pub enum WhatsAppError {
    #[error("whatsapp request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("whatsapp api error: {0}")]
    Api(String),
}

/// Client for the WhatsApp Cloud API (send side).
#[derive(Clone)]
pub struct WhatsAppClient {
    api_base: String,
    access_token: String,
    phone_number_id: String,
    client: reqwest::Client,
}

impl WhatsAppClient {
    pub fn new(
        access_token: impl Into<String>,
        phone_number_id: impl Into<String>,
        api_base: Option<String>,
    ) -> Self {
        let api_base = api_base
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| GRAPH_API_BASE.to_string());
        Self {
            api_base,
            access_token: access_token.into(),
            phone_number_id: phone_number_id.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Send a text message to a recipient via POST /{phone_number_id}/messages.
    pub async fn send_text(&self, to: &str, text: &str) -> Result<(), WhatsAppError> {
        let url = format!("{}/{}/messages", self.api_base, self.phone_number_id);
        let body = json!({
            "messaging_product": "whatsapp",
            "to": to,
            "text": { "body": text }
        });
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(WhatsAppError::Api(format!("{} {}", status, body)));
        }
        log::debug!("whatsapp message sent to {}", to);
        Ok(())
    }
}

/// Inbound webhook payload. The Cloud API nests the interesting part deeply:
/// `entry[0].changes[0].value.messages[0]`; everything else (statuses,
/// contacts, metadata) is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub value: WebhookValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookValue {
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
}

#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub text: Option<TextContent>,
}

#[derive(Debug, Deserialize)]
pub struct TextContent {
    #[serde(default)]
    pub body: String,
}

impl WebhookEvent {
    /// First text message in the payload as `(sender, body)`.
    ///
    /// Returns None when any link of the path is absent or the message is not
    /// of type "text" (delivery statuses, media, reactions); those events are
    /// acknowledged without action.
    pub fn first_text_message(&self) -> Option<(&str, &str)> {
        let msg = self
            .entry
            .first()?
            .changes
            .first()?
            .value
            .messages
            .first()?;
        if msg.kind.as_deref() != Some("text") {
            return None;
        }
        let from = msg.from.as_deref().filter(|s| !s.is_empty())?;
        let body = msg.text.as_ref().map(|t| t.body.as_str())?;
        if body.is_empty() {
            return None;
        }
        Some((from, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> WebhookEvent {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn extracts_first_text_message() {
        let event = parse(
            r#"{
                "object": "whatsapp_business_account",
                "entry": [{
                    "id": "1",
                    "changes": [{
                        "field": "messages",
                        "value": {
                            "messaging_product": "whatsapp",
                            "contacts": [{"wa_id": "34612345678"}],
                            "messages": [{
                                "from": "34612345678",
                                "id": "wamid.abc",
                                "timestamp": "1700000000",
                                "type": "text",
                                "text": {"body": "what is the price of item 16?"}
                            }]
                        }
                    }]
                }]
            }"#,
        );
        let (from, body) = event.first_text_message().unwrap();
        assert_eq!(from, "34612345678");
        assert_eq!(body, "what is the price of item 16?");
    }

    #[test]
    fn status_update_yields_none() {
        // Delivery receipts carry `statuses`, not `messages`.
        let event = parse(
            r#"{
                "entry": [{
                    "changes": [{
                        "value": {
                            "statuses": [{"id": "wamid.abc", "status": "delivered"}]
                        }
                    }]
                }]
            }"#,
        );
        assert!(event.first_text_message().is_none());
    }

    #[test]
    fn non_text_message_yields_none() {
        let event = parse(
            r#"{
                "entry": [{
                    "changes": [{
                        "value": {
                            "messages": [{
                                "from": "34612345678",
                                "type": "image",
                                "image": {"id": "media-1"}
                            }]
                        }
                    }]
                }]
            }"#,
        );
        assert!(event.first_text_message().is_none());
    }

    #[test]
    fn missing_path_links_yield_none() {
        assert!(parse(r#"{}"#).first_text_message().is_none());
        assert!(parse(r#"{"entry": []}"#).first_text_message().is_none());
        assert!(parse(r#"{"entry": [{"changes": []}]}"#)
            .first_text_message()
            .is_none());
        assert!(parse(r#"{"entry": [{"changes": [{"value": {}}]}]}"#)
            .first_text_message()
            .is_none());
    }

    #[test]
    fn text_message_without_sender_yields_none() {
        let event = parse(
            r#"{
                "entry": [{
                    "changes": [{
                        "value": {
                            "messages": [{"type": "text", "text": {"body": "hello"}}]
                        }
                    }]
                }]
            }"#,
        );
        assert!(event.first_text_message().is_none());
    }

    #[test]
    fn default_api_base() {
        let c = WhatsAppClient::new("token", "12345", None);
        assert_eq!(c.api_base, "https://graph.facebook.com/v19.0");
    }
}
