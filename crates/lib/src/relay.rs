//! Relay: one chat turn against a hosted LLM provider.
//!
//! A single generic handler serves both providers; only the system
//! instruction, backend client, and model id differ. The handler validates
//! the (prompt, history) pair, prepends the provider's system instruction,
//! and forwards the result to the backend. It never stores conversation
//! state; that belongs to the caller.

use crate::llm::{ChatBackend, ChatMessage, LlmError};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// System instruction for the Groq relay: wholesale prices plus the
/// small-quantity markup rule.
const GROQ_SYSTEM_INSTRUCTION: &str = "\
You are a member of the Energyco Solar customer service team.
Your job is to talk with customers, understand their needs, and help them with \
questions about solar energy products.
Very important:
You must answer questions about products and prices exclusively from the \
\"approved Energyco product and price list\" below. Do not give any \
information or price that is not in this list.
Small-quantity pricing rule: the listed prices apply to orders of 10 units or \
more. If the customer orders fewer than 10 units, add 10% to the listed unit \
price. Exception: for the solar module (item 16), add only 5% for small \
quantities.
If the customer asks about a product or price that is not listed, reply \
politely and clearly that the information is not currently available in the \
approved list. Example reply: \"I'm sorry, I don't have information about \
[the requested product] at the moment. Can I help you with one of the \
products on our list?\"
Always be courteous and professional, and keep answering in the language the \
customer started with (Arabic or English).

Approved Energyco product and price list (prices in USD $):
No.\tProduct\tWarranty\tBase price (10+ units)
1.\tDeye 6 kW single-phase Hybrid Inverter (SUN-6K-SG04LP1-EU-SM2)\t5 years\t820$
2.\tDeye 6 kW single-phase Off Grid Inverter (SUN-6K-OG01LB1-EU-AM3)\t4 years\t460$
3.\tDeye 12 kW three-phase Hybrid Inverter (SUN-12K-SG04LP3-EU)\t5 years\t1695$
4.\tDeye 16 kW single-phase Hybrid Inverter (SUN-16K-SG01LP1-EU)\t5 years\t2100$
5.\tDeye 20 kW three-phase Hybrid Inverter (SUN-20k-SG05LP3-EU-SM2)\t5 years\t2600$
6.\tDeye 5.1 kWh L.V lithium Battery (SE-G5.1)\t4 years\t625$
7.\tDeye 10.2 kWh L.V lithium Battery (SE-G10.2)\t4 years\t1140$
8.\tDeye 30 kW three-phase Hybrid Inverter (SUN-30k-SG01HP3-EU-BM3)\t5 years\t3900$
9.\tDeye SUN-50K-SG01HP3-EU-BM4\t5 years\t4400$
10.\tDeye BOS-G PRO HV lithium Battery\t5 years\t820$
11.\tDeye BOS-G H-Rack (13 layer)\t5 years\t300$
12.\tBOS-G CONTROL BOX\t5 years\t700$
13.\tBOS-A7.68 HV lithium Battery\t5 years\t1150$
14.\t14 LAYER RACK\t5 years\t330$
15.\tCONTROL BOX (PDU-2-BOS-A)\t5 years\t950$
16.\tLONGI SOLAR 615W HI-MO-7 Bifacial Module with Dual Glass\t12 years\t75$";

/// System instruction for the DeepSeek/Novita relay: both price columns are
/// spelled out so the model quotes them directly instead of applying the
/// markup rule itself.
const NOVITA_SYSTEM_INSTRUCTION: &str = "\
You are a member of the Energyco Solar customer service team.
Your job is to talk with customers, understand their needs, and help them with \
questions about solar energy products.
Very important:
You must answer questions about products and prices exclusively from the \
\"approved Energyco product and price list\" below.
How to present prices: when answering a price question, show both prices for \
each product exactly as in the table. State the \"wholesale price (10+ \
units)\" and the \"retail price (fewer than 10 units)\" for every item. Do \
not give only the base price with a note at the end.
If the customer asks about a product that is not listed, reply politely that \
the information is not currently available.
Always be courteous and professional, and use the customer's language \
(Arabic or English).

Approved Energyco product and price list (prices in USD $):
No.\tProduct\tWarranty\tWholesale price (10+ units)\tRetail price (under 10 units)
1.\tDeye 6 kW single-phase Hybrid Inverter (SUN-6K-SG04LP1-EU-SM2)\t5 years\t820$\t902$
2.\tDeye 6 kW single-phase Off Grid Inverter (SUN-6K-OG01LB1-EU-AM3)\t4 years\t460$\t506$
3.\tDeye 12 kW three-phase Hybrid Inverter (SUN-12K-SG04LP3-EU)\t5 years\t1695$\t1864.5$
4.\tDeye 16 kW single-phase Hybrid Inverter (SUN-16K-SG01LP1-EU)\t5 years\t2100$\t2310$
5.\tDeye 20 kW three-phase Hybrid Inverter (SUN-20k-SG05LP3-EU-SM2)\t5 years\t2600$\t2860$
6.\tDeye 5.1 kWh L.V lithium Battery (SE-G5.1)\t4 years\t625$\t687.5$
7.\tDeye 10.2 kWh L.V lithium Battery (SE-G10.2)\t4 years\t1140$\t1254$
8.\tDeye 30 kW three-phase Hybrid Inverter (SUN-30k-SG01HP3-EU-BM3)\t5 years\t3900$\t4290$
9.\tDeye SUN-50K-SG01HP3-EU-BM4\t5 years\t4400$\t4840$
10.\tDeye BOS-G PRO HV lithium Battery\t5 years\t820$\t902$
11.\tDeye BOS-G H-Rack (13 layer)\t5 years\t300$\t330$
12.\tBOS-G CONTROL BOX\t5 years\t700$\t770$
13.\tBOS-A7.68 HV lithium Battery\t5 years\t1150$\t1265$
14.\t14 LAYER RACK\t5 years\t330$\t363$
15.\tCONTROL BOX (PDU-2-BOS-A)\t5 years\t950$\t1045$
16.\tLONGI SOLAR 615W HI-MO-7 Bifacial Module with Dual Glass\t12 years\t75$\t78.75$";

/// The two configured LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Groq,
    Novita,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::Groq, ProviderKind::Novita];

    /// URL path segment for this provider (`/relay/{provider}`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "groq",
            ProviderKind::Novita => "novita",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "LLaMA 3 (Groq)",
            ProviderKind::Novita => "DeepSeek (HF/Novita)",
        }
    }

    /// Parse a path segment or user-supplied name. Case-insensitive;
    /// "deepseek" is accepted as an alias for the Novita relay.
    pub fn from_path(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "groq" => Some(ProviderKind::Groq),
            "novita" | "deepseek" => Some(ProviderKind::Novita),
            _ => None,
        }
    }

    /// The fixed system instruction injected at position 0 of every request.
    pub fn system_instruction(&self) -> &'static str {
        match self {
            ProviderKind::Groq => GROQ_SYSTEM_INSTRUCTION,
            ProviderKind::Novita => NOVITA_SYSTEM_INSTRUCTION,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Config(String),
    #[error("{message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },
}

impl RelayError {
    /// HTTP status for this error: 400 for bad input, the provider's status
    /// when it supplied one, 500 otherwise.
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::Upstream { status, .. } => status
                .and_then(|s| StatusCode::from_u16(s).ok())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

/// Request body of `POST /relay/{provider}`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RelayRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub history: Option<Vec<ChatMessage>>,
}

/// Success body of `POST /relay/{provider}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RelayResponse {
    pub reply: ChatMessage,
}

/// One relay: a provider's system instruction, backend client, and model id.
pub struct RelayHandler {
    provider: ProviderKind,
    model: String,
    backend: Arc<dyn ChatBackend>,
}

impl RelayHandler {
    pub fn new(provider: ProviderKind, model: impl Into<String>, backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            provider,
            model: model.into(),
            backend,
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    /// One round trip: validate, build the outbound list, call the backend,
    /// extract the assistant reply. Does not touch any stored conversation.
    pub async fn send(
        &self,
        prompt: &str,
        history: &[ChatMessage],
    ) -> Result<ChatMessage, RelayError> {
        let messages = build_outbound(self.provider.system_instruction(), prompt, history)?;
        log::info!(
            "relay: sending {} message(s) to {} (model {})",
            messages.len(),
            self.provider,
            self.model
        );
        let res = self
            .backend
            .chat(&self.model, messages)
            .await
            .map_err(upstream_error)?;
        match res.message {
            Some(m) if !m.content.trim().is_empty() => Ok(ChatMessage::assistant(m.content)),
            _ => Err(RelayError::Upstream {
                status: None,
                message: "provider returned no usable content".to_string(),
            }),
        }
    }
}

/// Build the outbound message list: `[system] + filtered history + [user: prompt]`.
///
/// History arrives from the client and is filtered to non-empty user/assistant
/// entries, so a stale or hostile caller can never inject a second system
/// message. Fails when there is nothing at all to send, or when the result
/// contains no user-authored message.
fn build_outbound(
    system: &str,
    prompt: &str,
    history: &[ChatMessage],
) -> Result<Vec<ChatMessage>, RelayError> {
    if prompt.is_empty() && history.is_empty() {
        return Err(RelayError::BadRequest(
            "prompt or history is required".to_string(),
        ));
    }

    let mut messages = vec![ChatMessage::system(system)];
    messages.extend(
        history
            .iter()
            .filter(|m| (m.role == "user" || m.role == "assistant") && !m.content.is_empty())
            .cloned(),
    );
    if !prompt.is_empty() {
        messages.push(ChatMessage::user(prompt));
    }

    if !messages.iter().any(|m| m.role == "user") {
        return Err(RelayError::BadRequest(
            "no user messages to send".to_string(),
        ));
    }
    Ok(messages)
}

fn upstream_error(err: LlmError) -> RelayError {
    match err {
        LlmError::Api { status, message } => RelayError::Upstream {
            status: Some(status),
            message,
        },
        LlmError::Request(e) => RelayError::Upstream {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatBackend, ChatResponse};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Backend stub that records what it was asked to send.
    struct RecordingBackend {
        reply: Option<String>,
        calls: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl RecordingBackend {
        fn replying(content: &str) -> Self {
            Self {
                reply: Some(content.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn empty() -> Self {
            Self {
                reply: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChatBackend for RecordingBackend {
        async fn chat(
            &self,
            _model: &str,
            messages: Vec<ChatMessage>,
        ) -> Result<ChatResponse, LlmError> {
            self.calls.lock().unwrap().push(messages);
            Ok(ChatResponse {
                message: self.reply.as_ref().map(|c| ChatMessage::assistant(c.clone())),
            })
        }
    }

    fn handler(backend: Arc<RecordingBackend>) -> RelayHandler {
        RelayHandler::new(ProviderKind::Groq, "test-model", backend)
    }

    #[test]
    fn outbound_starts_with_single_system_message() {
        let history = vec![
            ChatMessage::system("injected by a stale client"),
            ChatMessage::user("hello"),
            ChatMessage::assistant("hi, how can I help?"),
        ];
        let messages = build_outbound("the real instruction", "", &history).unwrap();
        let system_count = messages.iter().filter(|m| m.role == "system").count();
        assert_eq!(system_count, 1);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content, "the real instruction");
        assert_eq!(messages.len(), 3);
    }

    #[test]
    fn prompt_is_appended_last() {
        let history = vec![ChatMessage::user("earlier"), ChatMessage::assistant("ok")];
        let messages = build_outbound("sys", "what about item 16?", &history).unwrap();
        let last = messages.last().unwrap();
        assert_eq!(last.role, "user");
        assert_eq!(last.content, "what about item 16?");
    }

    #[test]
    fn empty_history_entries_are_dropped() {
        let history = vec![ChatMessage::user(""), ChatMessage::user("real question")];
        let messages = build_outbound("sys", "", &history).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "real question");
    }

    #[test]
    fn empty_input_is_rejected() {
        let err = build_outbound("sys", "", &[]).unwrap_err();
        assert!(matches!(err, RelayError::BadRequest(_)));
    }

    #[test]
    fn assistant_only_history_is_rejected() {
        let history = vec![ChatMessage::assistant("I said something earlier")];
        let err = build_outbound("sys", "", &history).unwrap_err();
        assert!(matches!(err, RelayError::BadRequest(_)));
    }

    #[tokio::test]
    async fn empty_input_performs_no_backend_call() {
        let backend = Arc::new(RecordingBackend::replying("unused"));
        let h = handler(backend.clone());
        let err = h.send("", &[]).await.unwrap_err();
        assert!(matches!(err, RelayError::BadRequest(_)));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn send_returns_assistant_reply() {
        let backend = Arc::new(RecordingBackend::replying("the module is 75$"));
        let h = handler(backend.clone());
        let reply = h.send("price of item 16?", &[]).await.unwrap();
        assert_eq!(reply.role, "assistant");
        assert_eq!(reply.content, "the module is 75$");
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn empty_provider_reply_is_an_upstream_error() {
        let backend = Arc::new(RecordingBackend::empty());
        let h = handler(backend);
        let err = h.send("hello", &[]).await.unwrap_err();
        assert!(matches!(err, RelayError::Upstream { status: None, .. }));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn upstream_error_keeps_provider_status() {
        let err = RelayError::Upstream {
            status: Some(429),
            message: "rate limited".to_string(),
        };
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn provider_from_path() {
        assert_eq!(ProviderKind::from_path("groq"), Some(ProviderKind::Groq));
        assert_eq!(ProviderKind::from_path("Novita"), Some(ProviderKind::Novita));
        assert_eq!(ProviderKind::from_path("deepseek"), Some(ProviderKind::Novita));
        assert_eq!(ProviderKind::from_path("openai"), None);
    }

    #[test]
    fn system_instructions_carry_the_catalog() {
        for p in ProviderKind::ALL {
            let text = p.system_instruction();
            assert!(text.contains("LONGI SOLAR 615W"));
            assert!(text.contains("Deye 6 kW single-phase Hybrid Inverter"));
            assert!(text.contains("75$"));
        }
        // Only the Novita instruction spells out the retail column.
        assert!(ProviderKind::Novita.system_instruction().contains("78.75$"));
        assert!(!ProviderKind::Groq.system_instruction().contains("78.75$"));
    }
}
