//! Compaction policy for bounding transcript size.
//!
//! Once per reasoning step, before the sanitized view is sent to the model,
//! the policy decides whether the "compactable middle" of the transcript
//! must be folded into the running summary:
//!
//! 1. Split off the leading system prefix (always preserved verbatim).
//! 2. If the remainder fits within the keep-recent window, do nothing.
//! 3. Shrink the retained tail until it is pairing-valid in isolation, so
//!    the tail never begins mid-tool-exchange. A tail that shrinks to zero
//!    skips compaction for the step entirely.
//! 4. Estimate the middle's token cost via the external counter, degrading
//!    to the chars/4 heuristic on failure.
//! 5. Above the threshold: enqueue a fire-and-forget background summary,
//!    synchronously chain a new summary from the previous one, commit it,
//!    then mark the middle as compressed.
//!
//! The caller's single-writer discipline makes the summary commit and the
//! mark application atomic with respect to the next model-facing view.

use tracing::{info, warn};

use copaw_core::ids::MessageId;
use copaw_core::message::{Mark, Message, leading_system_len};
use copaw_settings::CompactionSettings;

use crate::sanitizer::is_pairing_valid;
use crate::summarizer::{Summarizer, SummarizerError};
use crate::token_count::TokenCounter;
use crate::token_estimator::estimate_messages_tokens;
use crate::transcript::TranscriptStore;

// =============================================================================
// Collaborators
// =============================================================================

/// Fire-and-forget background summarization.
///
/// `enqueue` must return immediately; the result is never awaited by the
/// compaction step and failures must stay on the background side.
pub trait BackgroundSummaries: Send + Sync {
    /// Queue a background summarization over `messages`.
    fn enqueue(&self, messages: Vec<Message>);
}

// =============================================================================
// Outcome types
// =============================================================================

/// Why a compaction step did nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The remainder fits within the keep-recent window.
    NothingToCompact,
    /// No pairing-valid retained tail exists (the remainder is one
    /// unresolved tool exchange).
    TailUnsafe,
    /// The compactable middle is under the token threshold.
    BelowThreshold,
}

/// Result of one compaction step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompactionOutcome {
    /// The middle was folded into the summary.
    Compacted {
        /// Messages newly marked compressed.
        marked: usize,
        /// Token estimate that triggered the fold.
        estimated_tokens: u64,
    },
    /// Nothing was folded.
    Skipped(SkipReason),
}

// =============================================================================
// CompactionPolicy
// =============================================================================

/// Decides when and what to fold, and performs the bookkeeping.
#[derive(Clone, Copy, Debug)]
pub struct CompactionPolicy {
    /// Number of recent messages retained verbatim.
    keep_recent: usize,
    /// Token budget for the compactable middle.
    token_threshold: u64,
}

impl CompactionPolicy {
    /// Create a policy with explicit tunables.
    #[must_use]
    pub fn new(keep_recent: usize, token_threshold: u64) -> Self {
        Self {
            keep_recent,
            token_threshold,
        }
    }

    /// Create a policy from settings.
    #[must_use]
    pub fn from_settings(settings: &CompactionSettings) -> Self {
        Self::new(settings.keep_recent, settings.token_threshold)
    }

    /// Run one compaction step over the store's live view.
    ///
    /// # Errors
    ///
    /// Propagates [`SummarizerError`] from the synchronous summarization
    /// call, the one failure the policy cannot recover locally, since
    /// marking without a usable summary would lose information. The store
    /// is not mutated in that case.
    pub async fn run_step(
        &self,
        store: &mut TranscriptStore,
        summarizer: &dyn Summarizer,
        counter: &dyn TokenCounter,
        background: &dyn BackgroundSummaries,
    ) -> Result<CompactionOutcome, SummarizerError> {
        let view = store.view(Some(Mark::Compressed), false);
        let middle = match self.compactable_middle(view) {
            Ok(middle) => middle,
            Err(reason) => {
                if reason == SkipReason::TailUnsafe {
                    warn!(
                        keep_recent = self.keep_recent,
                        "no pairing-valid tail within window, skipping compaction"
                    );
                }
                return Ok(CompactionOutcome::Skipped(reason));
            }
        };

        let estimated_tokens = estimate_with_fallback(counter, &middle);
        if estimated_tokens <= self.token_threshold {
            return Ok(CompactionOutcome::Skipped(SkipReason::BelowThreshold));
        }

        info!(
            estimated_tokens,
            threshold = self.token_threshold,
            compactable = middle.len(),
            "transcript compaction triggered"
        );
        let marked = self.fold(store, middle, summarizer, background).await?;
        Ok(CompactionOutcome::Compacted {
            marked,
            estimated_tokens,
        })
    }

    /// Fold the compactable middle regardless of the token threshold.
    ///
    /// Used by the explicit `compact` command. Windowing still applies: the
    /// retained tail and the system prefix are never folded.
    ///
    /// # Errors
    ///
    /// Propagates [`SummarizerError`] like [`CompactionPolicy::run_step`].
    pub async fn force_fold(
        &self,
        store: &mut TranscriptStore,
        summarizer: &dyn Summarizer,
        counter: &dyn TokenCounter,
        background: &dyn BackgroundSummaries,
    ) -> Result<CompactionOutcome, SummarizerError> {
        let view = store.view(Some(Mark::Compressed), false);
        let middle = match self.compactable_middle(view) {
            Ok(middle) => middle,
            Err(reason) => return Ok(CompactionOutcome::Skipped(reason)),
        };
        let estimated_tokens = estimate_with_fallback(counter, &middle);
        let marked = self.fold(store, middle, summarizer, background).await?;
        Ok(CompactionOutcome::Compacted {
            marked,
            estimated_tokens,
        })
    }

    // ── Private helpers ──────────────────────────────────────────────────

    /// Compute the compactable middle of a live view, or the reason there
    /// is none.
    fn compactable_middle(&self, mut view: Vec<Message>) -> Result<Vec<Message>, SkipReason> {
        let preserved = leading_system_len(&view);
        let remainder_len = view.len() - preserved;
        if remainder_len <= self.keep_recent {
            return Err(SkipReason::NothingToCompact);
        }

        // Shrink the keep window until the retained tail is pairing-valid
        // in isolation.
        let remainder = &view[preserved..];
        let mut keep = self.keep_recent;
        while keep > 0 && !is_pairing_valid(&remainder[remainder_len - keep..]) {
            keep -= 1;
        }
        if keep == 0 {
            return Err(SkipReason::TailUnsafe);
        }

        let middle_len = remainder_len - keep;
        if middle_len == 0 {
            return Err(SkipReason::NothingToCompact);
        }
        view.truncate(preserved + middle_len);
        Ok(view.split_off(preserved))
    }

    /// Enqueue the background task, chain the summary, commit, mark.
    async fn fold(
        &self,
        store: &mut TranscriptStore,
        middle: Vec<Message>,
        summarizer: &dyn Summarizer,
        background: &dyn BackgroundSummaries,
    ) -> Result<usize, SummarizerError> {
        background.enqueue(middle.clone());

        let summary = summarizer.summarize(&middle, store.summary()).await?;
        // The summary must be committed before marks are applied: a view
        // must never observe marks without their covering summary.
        store.set_summary(summary);
        let ids: Vec<MessageId> = middle.iter().map(|m| m.id.clone()).collect();
        let marked = store.mark_messages(&ids, Mark::Compressed);
        info!(marked, "marked messages as compacted");
        Ok(marked)
    }
}

/// Count tokens, degrading to the chars/4 heuristic on failure.
fn estimate_with_fallback(counter: &dyn TokenCounter, messages: &[Message]) -> u64 {
    match counter.count(messages) {
        Ok(tokens) => tokens,
        Err(err) => {
            let fallback = estimate_messages_tokens(messages);
            warn!(
                error = %err,
                fallback,
                "token counting failed, using heuristic estimate"
            );
            fallback
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
