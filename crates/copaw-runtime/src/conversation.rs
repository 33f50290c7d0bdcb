//! The per-conversation engine surface.
//!
//! A [`Conversation`] owns one transcript store, one compaction policy, and
//! one background summary queue. It is the single logical writer for its
//! transcript: sanitization and compaction run to completion on each
//! reasoning step before the model call is issued, and nothing else mutates
//! the store concurrently (the registry hands conversations out behind a
//! mutex).
//!
//! [`Conversation::prepare_context`] is the once-per-reasoning-step entry
//! point: sanitize → compact → mark-filtered view, in that order, with no
//! caching of a previous sanitized result across steps.

use std::sync::Arc;

use tracing::debug;

use copaw_context::compaction::{
    BackgroundSummaries, CompactionOutcome, CompactionPolicy,
};
use copaw_context::summarizer::Summarizer;
use copaw_context::token_count::TokenCounter;
use copaw_context::transcript::TranscriptStore;
use copaw_core::ids::{ConversationId, MessageId};
use copaw_core::message::{Mark, Message, leading_system_len};
use copaw_settings::CompactionSettings;

use crate::background::{BackgroundSummary, BackgroundSummaryQueue};
use crate::commands::{Command, CommandReply};
use crate::errors::RuntimeError;

/// One conversation's transcript engine.
pub struct Conversation {
    id: ConversationId,
    store: TranscriptStore,
    policy: CompactionPolicy,
    summarizer: Arc<dyn Summarizer>,
    counter: Arc<dyn TokenCounter>,
    background: BackgroundSummaryQueue,
}

impl Conversation {
    /// Create a conversation with its own store and background worker.
    #[must_use]
    pub fn new(
        id: ConversationId,
        settings: &CompactionSettings,
        summarizer: Arc<dyn Summarizer>,
        counter: Arc<dyn TokenCounter>,
    ) -> Self {
        let background = BackgroundSummaryQueue::spawn(Arc::clone(&summarizer));
        Self {
            id,
            store: TranscriptStore::new(),
            policy: CompactionPolicy::from_settings(settings),
            summarizer,
            counter,
            background,
        }
    }

    /// The conversation's identifier.
    #[must_use]
    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    /// Read access to the transcript store.
    #[must_use]
    pub fn store(&self) -> &TranscriptStore {
        &self.store
    }

    /// Append a message to the transcript.
    pub fn append(&mut self, message: Message) {
        self.store.append(message);
    }

    /// Produce the model-facing view for one reasoning step.
    ///
    /// Runs the pairing sanitizer over the live transcript (committing any
    /// repairs), then the compaction policy, then returns the mark-filtered
    /// view with the compressed summary prepended.
    ///
    /// # Errors
    ///
    /// Propagates a summarization failure from the compaction step.
    pub async fn prepare_context(&mut self) -> Result<Vec<Message>, RuntimeError> {
        let repaired = self.store.sanitize_in_place();
        if repaired {
            debug!(conversation_id = %self.id, "sanitizer repaired transcript");
        }

        let outcome = self
            .policy
            .run_step(
                &mut self.store,
                &*self.summarizer,
                &*self.counter,
                &self.background,
            )
            .await?;
        debug!(conversation_id = %self.id, ?outcome, "compaction step finished");

        Ok(self.store.view(Some(Mark::Compressed), true))
    }

    /// Drain background summaries completed so far.
    ///
    /// Result application stays on the conversation's writer this way;
    /// the background worker itself never touches shared state.
    pub fn drain_background_summaries(&mut self) -> Vec<BackgroundSummary> {
        self.background.try_drain()
    }

    // ── Commands ─────────────────────────────────────────────────────────

    /// Handle a conversation command string.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::UnknownCommand`] for unrecognized input;
    /// summarization failures propagate from `compact`.
    pub async fn handle_command(&mut self, input: &str) -> Result<CommandReply, RuntimeError> {
        let command = Command::parse(input)?;
        debug!(conversation_id = %self.id, ?command, "handling command");

        let view = self.store.view(Some(Mark::Compressed), false);
        if view.is_empty() {
            return Ok(CommandReply::NothingToDo {
                text: "**No messages to process.**\n\n\
                       - Current transcript is empty\n\
                       - No action taken"
                    .into(),
            });
        }

        match command {
            Command::Compact => self.command_compact().await,
            Command::New => Ok(self.command_new(view)),
            Command::Clear => Ok(self.command_clear()),
            Command::History => Ok(Self::command_history(&view)),
        }
    }

    /// `compact`: fold the compactable middle regardless of threshold.
    async fn command_compact(&mut self) -> Result<CommandReply, RuntimeError> {
        let outcome = self
            .policy
            .force_fold(
                &mut self.store,
                &*self.summarizer,
                &*self.counter,
                &self.background,
            )
            .await?;

        match outcome {
            CompactionOutcome::Compacted { marked, .. } => Ok(CommandReply::Performed {
                text: format!(
                    "**Compact Complete!**\n\n\
                     - Messages compacted: {marked}\n\n\
                     **Compressed Summary:**\n{}\n\n\
                     - Summary task started in background",
                    self.store.summary()
                ),
            }),
            CompactionOutcome::Skipped(_) => Ok(CommandReply::NothingToDo {
                text: "**Nothing to compact.**\n\n\
                       - Conversation fits within the retained window"
                    .into(),
            }),
        }
    }

    /// `new`: fold the entire remainder and reset the summary, leaving the
    /// system prefix and previously stored marks untouched.
    fn command_new(&mut self, view: Vec<Message>) -> CommandReply {
        let preserved = leading_system_len(&view);
        let remainder = &view[preserved..];
        if !remainder.is_empty() {
            self.background.enqueue(remainder.to_vec());
        }

        self.store.set_summary("");
        let ids: Vec<MessageId> = remainder.iter().map(|m| m.id.clone()).collect();
        let marked = self.store.mark_messages(&ids, Mark::Compressed);
        debug!(conversation_id = %self.id, marked, "remainder folded for new conversation");

        CommandReply::Performed {
            text: "**New Conversation Started!**\n\n\
                   - Summary task started in background\n\
                   - Ready for new conversation"
                .into(),
        }
    }

    /// `clear`: discard the whole transcript and summary.
    fn command_clear(&mut self) -> CommandReply {
        self.store.clear();
        CommandReply::Performed {
            text: "**History Cleared!**\n\n\
                   - Compressed summary reset\n\
                   - Transcript is now empty"
                .into(),
        }
    }

    /// `history`: read-only dump of the current view.
    fn command_history(view: &[Message]) -> CommandReply {
        let lines: Vec<String> = view
            .iter()
            .enumerate()
            .map(|(idx, msg)| {
                format!("[{}] **{}**: {}", idx + 1, msg.role, msg.text_preview(100))
            })
            .collect();
        CommandReply::Performed {
            text: format!(
                "**Conversation History**\n\n- Total messages: {}\n\n{}",
                view.len(),
                lines.join("\n")
            ),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
