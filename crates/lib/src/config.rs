//! Configuration types and loading.
//!
//! Config is loaded once at startup from a JSON file (e.g.
//! `~/.sunline/config.json`) and passed into each component as a read-only
//! struct. Secrets may also come from the environment; each `resolve_*`
//! function prefers the environment variable over the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// LLM provider settings (keys, model ids, endpoint overrides).
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Channel settings (WhatsApp webhook + Cloud API).
    #[serde(default)]
    pub channels: ChannelsConfig,
}

/// Server bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port for the relay, webhook, and chat page (default 8686).
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1"). The webhook endpoint must be
    /// reachable by the platform, so deployments typically bind 0.0.0.0
    /// behind a TLS proxy.
    #[serde(default = "default_server_bind")]
    pub bind: String,
}

fn default_server_port() -> u16 {
    8686
}

fn default_server_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
            bind: default_server_bind(),
        }
    }
}

/// Per-provider config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvidersConfig {
    #[serde(default)]
    pub groq: GroqProviderConfig,
    #[serde(default)]
    pub novita: NovitaProviderConfig,
}

/// Groq settings. The key may instead come from GROQ_API_KEY.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroqProviderConfig {
    pub api_key: Option<String>,
    /// Model id; GROQ_MODEL_ID overrides, client default applies when unset.
    pub model: Option<String>,
    /// Endpoint override (tests, proxies). The hosted API is used when unset.
    pub base_url: Option<String>,
}

/// DeepSeek-via-Novita settings. The token may instead come from
/// HUGGINGFACE_API_TOKEN.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NovitaProviderConfig {
    pub api_token: Option<String>,
    /// Model id; NOVITA_MODEL_ID overrides, client default applies when unset.
    pub model: Option<String>,
    /// Endpoint override (tests, proxies).
    pub base_url: Option<String>,
}

/// Per-channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelsConfig {
    #[serde(default)]
    pub whatsapp: WhatsAppChannelConfig,
}

/// WhatsApp webhook + Cloud API config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppChannelConfig {
    /// Pre-shared secret for webhook subscription verification.
    /// Overridden by VERIFY_TOKEN when set.
    pub verify_token: Option<String>,
    /// Cloud API access token. Overridden by WHATSAPP_TOKEN.
    pub access_token: Option<String>,
    /// Sender phone number id. Overridden by PHONE_NUMBER_ID.
    pub phone_number_id: Option<String>,
    /// Relay endpoint the bridge forwards to. Overridden by RELAY_URL;
    /// defaults to this process's own /relay/groq.
    pub relay_url: Option<String>,
    /// Graph API base override (tests). The hosted API is used when unset.
    pub api_base: Option<String>,
}

fn non_empty_env(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Webhook verification secret: VERIFY_TOKEN env overrides config.
pub fn resolve_verify_token(config: &Config) -> Option<String> {
    non_empty_env("VERIFY_TOKEN").or_else(|| non_empty(&config.channels.whatsapp.verify_token))
}

/// Cloud API access token: WHATSAPP_TOKEN env overrides config.
pub fn resolve_whatsapp_token(config: &Config) -> Option<String> {
    non_empty_env("WHATSAPP_TOKEN").or_else(|| non_empty(&config.channels.whatsapp.access_token))
}

/// Sender phone number id: PHONE_NUMBER_ID env overrides config.
pub fn resolve_phone_number_id(config: &Config) -> Option<String> {
    non_empty_env("PHONE_NUMBER_ID")
        .or_else(|| non_empty(&config.channels.whatsapp.phone_number_id))
}

/// Relay endpoint the bridge targets: RELAY_URL env, then config, then this
/// process's own Groq relay on loopback.
pub fn resolve_relay_url(config: &Config) -> String {
    non_empty_env("RELAY_URL")
        .or_else(|| non_empty(&config.channels.whatsapp.relay_url))
        .unwrap_or_else(|| format!("http://127.0.0.1:{}/relay/groq", config.server.port))
}

/// Groq API key: GROQ_API_KEY env overrides config.
pub fn resolve_groq_api_key(config: &Config) -> Option<String> {
    non_empty_env("GROQ_API_KEY").or_else(|| non_empty(&config.providers.groq.api_key))
}

/// Groq model id: GROQ_MODEL_ID env, then config, then the client default.
pub fn resolve_groq_model(config: &Config) -> String {
    non_empty_env("GROQ_MODEL_ID")
        .or_else(|| non_empty(&config.providers.groq.model))
        .unwrap_or_else(|| crate::llm::groq::DEFAULT_MODEL.to_string())
}

/// Hugging Face token for the Novita route: HUGGINGFACE_API_TOKEN env
/// overrides config.
pub fn resolve_novita_token(config: &Config) -> Option<String> {
    non_empty_env("HUGGINGFACE_API_TOKEN").or_else(|| non_empty(&config.providers.novita.api_token))
}

/// Novita model id: NOVITA_MODEL_ID env, then config, then the client default.
pub fn resolve_novita_model(config: &Config) -> String {
    non_empty_env("NOVITA_MODEL_ID")
        .or_else(|| non_empty(&config.providers.novita.model))
        .unwrap_or_else(|| crate::llm::novita::DEFAULT_MODEL.to_string())
}

/// Resolve config path from env or default (~/.sunline/config.json).
pub fn default_config_path() -> PathBuf {
    std::env::var("SUNLINE_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".sunline").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the default path (or SUNLINE_CONFIG_PATH). Missing file
/// => default config. Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

/// Create the config directory and an empty config file if they do not exist.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, b"{}")
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }
    Ok(config_dir.to_path_buf())
}
