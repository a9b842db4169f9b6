//! The registry of in-flight generations.
//!
//! One entry per chat id, holding the cancellation token of the running
//! call. Registration doubles as the UI's streaming/typing signal; removal
//! is owned by the send path, which clears the entry on every outcome once
//! the provider call settles.

use std::collections::HashMap;
use std::sync::Mutex;

use chat_core::{CancellationToken, ChatId};

use crate::error::StateError;
use crate::lock;

/// Tracks which chats have a generation in flight.
#[derive(Debug, Default)]
pub struct GenerationRegistry {
    active: Mutex<HashMap<ChatId, CancellationToken>>,
}

impl GenerationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a generation for a chat and hand back its fresh token.
    ///
    /// A chat can run at most one generation at a time; a second `begin`
    /// while the first is still registered is rejected.
    pub fn begin(&self, chat: ChatId) -> Result<CancellationToken, StateError> {
        let mut active = lock::lock(&self.active);
        if active.contains_key(&chat) {
            return Err(StateError::AlreadyStreaming(chat));
        }
        let token = CancellationToken::new();
        active.insert(chat, token.clone());
        Ok(token)
    }

    /// Remove a chat's entry. Safe to call when none exists.
    pub fn finish(&self, chat: ChatId) {
        lock::lock(&self.active).remove(&chat);
    }

    /// Fire the cancellation token of a chat's generation, if one is
    /// registered. Returns whether anything was signalled. Idempotent and a
    /// no-op after the generation has settled.
    pub fn abort(&self, chat: ChatId) -> bool {
        match lock::lock(&self.active).get(&chat) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Whether a generation is registered for this chat.
    pub fn is_active(&self, chat: ChatId) -> bool {
        lock::lock(&self.active).contains_key(&chat)
    }

    /// Number of chats currently streaming.
    pub fn active_count(&self) -> usize {
        lock::lock(&self.active).len()
    }

    /// Snapshot of the streaming chat ids.
    pub fn active_chats(&self) -> Vec<ChatId> {
        lock::lock(&self.active).keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_begin_finish_cycle() {
        let registry = GenerationRegistry::new();
        let chat = Uuid::new_v4();

        assert!(!registry.is_active(chat));
        let token = registry.begin(chat).unwrap();
        assert!(registry.is_active(chat));
        assert!(!token.is_cancelled());

        registry.finish(chat);
        assert!(!registry.is_active(chat));
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn test_double_begin_rejected() {
        let registry = GenerationRegistry::new();
        let chat = Uuid::new_v4();

        registry.begin(chat).unwrap();
        let second = registry.begin(chat);
        assert!(matches!(second, Err(StateError::AlreadyStreaming(id)) if id == chat));

        // The original entry is untouched
        assert!(registry.is_active(chat));
    }

    #[test]
    fn test_abort_fires_registered_token() {
        let registry = GenerationRegistry::new();
        let chat = Uuid::new_v4();
        let token = registry.begin(chat).unwrap();

        assert!(registry.abort(chat));
        assert!(token.is_cancelled());
        // Entry removal is the send path's job, not abort's
        assert!(registry.is_active(chat));

        // Repeated aborts stay safe
        assert!(registry.abort(chat));
    }

    #[test]
    fn test_abort_idle_chat_is_noop() {
        let registry = GenerationRegistry::new();
        assert!(!registry.abort(Uuid::new_v4()));
    }

    #[test]
    fn test_independent_chats() {
        let registry = GenerationRegistry::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        registry.begin(a).unwrap();
        registry.begin(b).unwrap();
        assert_eq!(registry.active_count(), 2);

        registry.finish(a);
        assert!(!registry.is_active(a));
        assert!(registry.is_active(b));
    }
}
