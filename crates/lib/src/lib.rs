//! Sunline core library — configuration, LLM provider clients, the relay,
//! the WhatsApp webhook bridge, and the HTTP server, shared with the CLI.

pub mod bridge;
pub mod channels;
pub mod config;
pub mod conversation;
pub mod llm;
pub mod relay;
pub mod server;
