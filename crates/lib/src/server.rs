//! HTTP server: chat page, relay endpoints, and the WhatsApp webhook.

use crate::bridge::{self, VerifyParams, WebhookBridge};
use crate::channels::whatsapp::{WebhookEvent, WhatsAppClient};
use crate::config::{self, Config};
use crate::llm::{GroqClient, NovitaClient};
use crate::relay::{ProviderKind, RelayError, RelayHandler, RelayRequest};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

static CHAT_PAGE: &str = include_str!("../assets/chat.html");

/// Shared state: read-only config, one relay per configured provider, and
/// the webhook bridge.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    relays: Arc<HashMap<ProviderKind, RelayHandler>>,
    bridge: Arc<WebhookBridge>,
}

/// Build the application state from config. Providers without an API key get
/// no relay; their endpoint reports the missing configuration per request,
/// before any network call would be made.
pub fn build_state(config: Config) -> AppState {
    let mut relays = HashMap::new();

    if let Some(key) = config::resolve_groq_api_key(&config) {
        let client = GroqClient::new(key, config.providers.groq.base_url.clone());
        let model = config::resolve_groq_model(&config);
        relays.insert(
            ProviderKind::Groq,
            RelayHandler::new(ProviderKind::Groq, model, Arc::new(client)),
        );
    } else {
        log::warn!("groq api key not configured; /relay/groq will report an error");
    }

    if let Some(token) = config::resolve_novita_token(&config) {
        let client = NovitaClient::new(token, config.providers.novita.base_url.clone());
        let model = config::resolve_novita_model(&config);
        relays.insert(
            ProviderKind::Novita,
            RelayHandler::new(ProviderKind::Novita, model, Arc::new(client)),
        );
    } else {
        log::warn!("hugging face api token not configured; /relay/novita will report an error");
    }

    let whatsapp = match (
        config::resolve_whatsapp_token(&config),
        config::resolve_phone_number_id(&config),
    ) {
        (Some(token), Some(phone_number_id)) => Some(WhatsAppClient::new(
            token,
            phone_number_id,
            config.channels.whatsapp.api_base.clone(),
        )),
        _ => {
            log::warn!("whatsapp access token or phone number id not configured; webhook replies disabled");
            None
        }
    };
    let bridge = WebhookBridge::new(config::resolve_relay_url(&config), whatsapp);

    AppState {
        config: Arc::new(config),
        relays: Arc::new(relays),
        bridge: Arc::new(bridge),
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(chat_page))
        .route("/healthz", get(health))
        .route("/relay/:provider", post(relay))
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .with_state(state)
}

/// Run the server; binds to config.server.bind:config.server.port and blocks
/// until shutdown (Ctrl+C or SIGTERM).
pub async fn run_server(config: Config) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.bind.trim(), config.server.port);
    let state = build_state(config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("sunline listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited")?;
    log::info!("server stopped");
    Ok(())
}

/// Completes on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");
}

/// GET / — the embedded chat page.
async fn chat_page() -> Html<&'static str> {
    Html(CHAT_PAGE)
}

/// GET /healthz — simple health JSON (for probes).
async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let providers: Vec<&str> = ProviderKind::ALL
        .iter()
        .filter(|p| state.relays.contains_key(*p))
        .map(|p| p.as_str())
        .collect();
    Json(json!({
        "runtime": "running",
        "port": state.config.server.port,
        "providers": providers,
    }))
}

/// POST /relay/{provider} — one chat turn against the named provider.
async fn relay(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    body: Option<Json<RelayRequest>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let Some(kind) = ProviderKind::from_path(&provider) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("unknown provider: {}", provider) })),
        );
    };
    let Some(handler) = state.relays.get(&kind) else {
        let err = RelayError::Config(format!(
            "{} is not configured (missing API key)",
            kind.display_name()
        ));
        log::warn!("relay {}: {}", kind, err);
        return (err.status(), Json(json!({ "error": err.to_string() })));
    };

    let req = body.map(|Json(r)| r).unwrap_or_default();
    let prompt = req.prompt.unwrap_or_default();
    let history = req.history.unwrap_or_default();
    match handler.send(&prompt, &history).await {
        Ok(reply) => (StatusCode::OK, Json(json!({ "reply": reply }))),
        Err(err) => {
            log::warn!("relay {} failed: {}", kind, err);
            (err.status(), Json(json!({ "error": err.to_string() })))
        }
    }
}

/// GET /webhook — subscription verification: echo the challenge on a token
/// match, 403 otherwise.
async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> (StatusCode, String) {
    let expected = config::resolve_verify_token(&state.config).unwrap_or_default();
    if bridge::subscription_ok(&params.mode, &params.verify_token, &expected) {
        log::info!("webhook subscription verified");
        (StatusCode::OK, params.challenge)
    } else {
        log::warn!("webhook verification rejected (mode: {:?})", params.mode);
        (StatusCode::FORBIDDEN, "Forbidden".to_string())
    }
}

/// POST /webhook — platform message delivery. Always acknowledges with 200;
/// the platform retries any other status, which would duplicate replies.
async fn receive_webhook(State(state): State<AppState>, body: Bytes) -> (StatusCode, &'static str) {
    match serde_json::from_slice::<WebhookEvent>(&body) {
        Ok(event) => state.bridge.process_event(event).await,
        Err(e) => log::debug!("webhook: ignoring undecodable payload: {}", e),
    }
    (StatusCode::OK, bridge::EVENT_ACK)
}
