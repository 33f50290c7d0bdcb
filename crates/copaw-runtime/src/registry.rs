//! Conversation registry.
//!
//! A factory keyed by [`ConversationId`]: each conversation owns its own
//! transcript store and compressed summary, constructed on first access.
//! There is no process-wide conversation state. Conversations are handed
//! out behind a `tokio` mutex, which enforces the single-writer discipline;
//! distinct conversations are fully independent and run in parallel.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

use copaw_context::summarizer::Summarizer;
use copaw_context::token_count::TokenCounter;
use copaw_core::ids::ConversationId;
use copaw_settings::CompactionSettings;

use crate::conversation::Conversation;

/// Shared handle to one conversation's single-writer lock.
pub type ConversationHandle = Arc<Mutex<Conversation>>;

/// Factory and lookup table for conversations.
pub struct ConversationRegistry {
    settings: CompactionSettings,
    summarizer: Arc<dyn Summarizer>,
    counter: Arc<dyn TokenCounter>,
    conversations: DashMap<ConversationId, ConversationHandle>,
}

impl ConversationRegistry {
    /// Create a registry with the collaborators shared by all
    /// conversations.
    #[must_use]
    pub fn new(
        settings: CompactionSettings,
        summarizer: Arc<dyn Summarizer>,
        counter: Arc<dyn TokenCounter>,
    ) -> Self {
        Self {
            settings,
            summarizer,
            counter,
            conversations: DashMap::new(),
        }
    }

    /// Get the conversation for `id`, constructing it on first access.
    #[must_use]
    pub fn get_or_create(&self, id: &ConversationId) -> ConversationHandle {
        self.conversations
            .entry(id.clone())
            .or_insert_with(|| {
                debug!(conversation_id = %id, "creating conversation");
                Arc::new(Mutex::new(Conversation::new(
                    id.clone(),
                    &self.settings,
                    Arc::clone(&self.summarizer),
                    Arc::clone(&self.counter),
                )))
            })
            .clone()
    }

    /// Remove a conversation. Returns `true` if it existed.
    pub fn remove(&self, id: &ConversationId) -> bool {
        self.conversations.remove(id).is_some()
    }

    /// Number of live conversations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    /// Returns `true` if no conversations are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
