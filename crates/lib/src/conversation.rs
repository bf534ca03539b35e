//! Per-provider conversation state for the chat UI.
//!
//! One independent message sequence per provider, holding user/assistant
//! turns only (the system instruction is injected per-request by the relay,
//! never stored here). Sends are optimistic: `begin` appends the user's
//! message and returns a snapshot, the caller then either `commit`s the
//! assistant reply or `rollback`s to the pre-request state, so the store only
//! ever reflects successful round trips.

use crate::llm::ChatMessage;
use crate::relay::ProviderKind;
use std::collections::HashMap;

/// Marker for the state a conversation had before an optimistic append.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot {
    provider: ProviderKind,
    len: usize,
}

/// In-memory, per-provider conversation store.
#[derive(Debug, Default)]
pub struct ConversationStore {
    histories: HashMap<ProviderKind, Vec<ChatMessage>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored history for a provider (empty when none yet).
    pub fn history(&self, provider: ProviderKind) -> &[ChatMessage] {
        self.histories
            .get(&provider)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Optimistically append the user's message (skipped when empty) and
    /// return a snapshot to roll back to if the send fails.
    pub fn begin(&mut self, provider: ProviderKind, prompt: &str) -> Snapshot {
        let history = self.histories.entry(provider).or_default();
        let snapshot = Snapshot {
            provider,
            len: history.len(),
        };
        if !prompt.is_empty() {
            history.push(ChatMessage::user(prompt));
        }
        snapshot
    }

    /// Append the assistant's reply after a successful round trip. System
    /// messages are never stored client-side.
    pub fn commit(&mut self, provider: ProviderKind, reply: ChatMessage) {
        if reply.role == "system" {
            log::warn!("conversation: dropping system message from {}", provider);
            return;
        }
        self.histories.entry(provider).or_default().push(reply);
    }

    /// Revert to the pre-request state; the failed send never happened.
    pub fn rollback(&mut self, snapshot: Snapshot) {
        if let Some(history) = self.histories.get_mut(&snapshot.provider) {
            history.truncate(snapshot.len);
        }
    }

    /// Clear one provider's conversation.
    pub fn reset(&mut self, provider: ProviderKind) {
        self.histories.remove(&provider);
    }
}
