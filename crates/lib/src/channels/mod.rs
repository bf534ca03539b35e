//! Messaging platform channels.
//!
//! Currently WhatsApp only: the Cloud API client used for outbound replies
//! and the inbound webhook payload types.

pub mod whatsapp;

pub use whatsapp::{WebhookEvent, WhatsAppClient, WhatsAppError};
