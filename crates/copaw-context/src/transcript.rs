//! In-memory transcript storage with token caching.
//!
//! [`TranscriptStore`] holds the ordered message sequence for one
//! conversation plus the running compressed summary. The sequence is
//! append-only except for mark mutation and the sanitize step, which is the
//! sole deletion path.
//!
//! A parallel token-count cache (same length as the message list) keeps
//! budget math cheap: estimates are computed once on insertion.

use std::collections::HashSet;

use tracing::debug;

use copaw_core::ids::MessageId;
use copaw_core::message::{Mark, Message, leading_system_len};

use crate::constants::SUMMARY_PREFIX;
use crate::sanitizer::sanitize;
use crate::token_estimator::estimate_message_tokens;

/// Ordered message sequence plus compressed summary for one conversation.
///
/// Not a source of concurrency: the store is protected by the caller's
/// single-writer discipline (one logical writer per conversation).
#[derive(Clone, Debug, Default)]
pub struct TranscriptStore {
    messages: Vec<Message>,
    summary: String,
    token_cache: Vec<u64>,
}

impl TranscriptStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ── Append and access ────────────────────────────────────────────────

    /// Append a message.
    ///
    /// The token estimate is computed and cached immediately.
    pub fn append(&mut self, message: Message) {
        self.token_cache.push(estimate_message_tokens(&message));
        self.messages.push(message);
    }

    /// Reference to the full internal message slice (no allocation).
    #[must_use]
    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }

    /// Current message count (marked messages included).
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if the store contains no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// A filtered copy of the transcript.
    ///
    /// Messages carrying `exclude_mark` are omitted. When
    /// `with_summary_prefix` is set and the compressed summary is non-empty,
    /// a synthetic system text message carrying the summary is prepended.
    #[must_use]
    pub fn view(&self, exclude_mark: Option<Mark>, with_summary_prefix: bool) -> Vec<Message> {
        let mut out: Vec<Message> = Vec::with_capacity(self.messages.len() + 1);
        if with_summary_prefix && !self.summary.is_empty() {
            out.push(Message::system(format!(
                "{SUMMARY_PREFIX}\n\n{}",
                self.summary
            )));
        }
        out.extend(
            self.messages
                .iter()
                .filter(|m| exclude_mark.is_none_or(|mark| !m.has_mark(mark)))
                .cloned(),
        );
        out
    }

    // ── Marks ────────────────────────────────────────────────────────────

    /// Attach `mark` to every listed message. Returns the count of messages
    /// newly marked.
    ///
    /// The leading system-role run is never marked, regardless of the ids
    /// passed in.
    pub fn mark_messages(&mut self, ids: &[MessageId], mark: Mark) -> usize {
        let wanted: HashSet<&MessageId> = ids.iter().collect();
        let preserved = leading_system_len(&self.messages);
        let mut newly_marked = 0;
        for msg in &mut self.messages[preserved..] {
            if wanted.contains(&msg.id) && msg.add_mark(mark) {
                newly_marked += 1;
            }
        }
        newly_marked
    }

    // ── Compressed summary ───────────────────────────────────────────────

    /// The current compressed summary (empty when none).
    #[must_use]
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Replace the compressed summary.
    pub fn set_summary(&mut self, text: impl Into<String>) {
        self.summary = text.into();
    }

    // ── Tokens ───────────────────────────────────────────────────────────

    /// Estimated token total across all messages (cached, no re-estimation).
    #[must_use]
    pub fn estimated_tokens(&self) -> u64 {
        self.token_cache.iter().sum()
    }

    /// Cached token estimate for the message at `index`.
    #[must_use]
    pub fn cached_tokens(&self, index: usize) -> Option<u64> {
        self.token_cache.get(index).copied()
    }

    // ── Sanitize and reset ───────────────────────────────────────────────

    /// Run the pairing sanitizer over the live (unmarked) portion of the
    /// transcript, committing the result. Returns `true` if anything
    /// changed.
    ///
    /// This is the transcript's only deletion path. The leading system run
    /// and messages already folded into the summary are left untouched; in
    /// every reachable state those precede the live remainder, so the
    /// reassembled sequence preserves the relative order of survivors.
    pub fn sanitize_in_place(&mut self) -> bool {
        let messages = std::mem::take(&mut self.messages);
        let preserved = leading_system_len(&messages);

        let mut kept: Vec<Message> = Vec::with_capacity(messages.len());
        let mut live: Vec<Message> = Vec::with_capacity(messages.len());
        for (idx, msg) in messages.into_iter().enumerate() {
            if idx < preserved || !msg.marks().is_empty() {
                kept.push(msg);
            } else {
                live.push(msg);
            }
        }

        let live_ids: Vec<MessageId> = live.iter().map(|m| m.id.clone()).collect();
        let sanitized = sanitize(live);
        let changed = sanitized.len() != live_ids.len()
            || sanitized.iter().map(|m| &m.id).ne(live_ids.iter());

        kept.extend(sanitized);
        self.messages = kept;
        if changed {
            debug!(len = self.messages.len(), "transcript repaired in place");
            self.rebuild_token_cache();
        }
        changed
    }

    /// Discard all messages and the compressed summary (hard reset).
    pub fn clear(&mut self) {
        self.messages.clear();
        self.token_cache.clear();
        self.summary.clear();
    }

    fn rebuild_token_cache(&mut self) {
        self.token_cache = self.messages.iter().map(estimate_message_tokens).collect();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    fn store_with(messages: Vec<Message>) -> TranscriptStore {
        let mut store = TranscriptStore::new();
        for msg in messages {
            store.append(msg);
        }
        store
    }

    // -- Construction and append --

    #[test]
    fn new_store_is_empty() {
        let store = TranscriptStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert_eq!(store.estimated_tokens(), 0);
        assert_eq!(store.summary(), "");
    }

    #[test]
    fn append_preserves_order() {
        let store = store_with(vec![
            Message::user("first"),
            Message::assistant("second"),
            Message::user("third"),
        ]);
        let view = store.view(None, false);
        assert_eq!(view.len(), 3);
        assert_eq!(view[0].text(), "first");
        assert_eq!(view[2].text(), "third");
    }

    #[test]
    fn append_caches_token_estimate() {
        let store = store_with(vec![Message::user("some message content")]);
        assert!(store.cached_tokens(0).unwrap() > 0);
        assert!(store.cached_tokens(1).is_none());
        assert_eq!(store.estimated_tokens(), store.cached_tokens(0).unwrap());
    }

    // -- view --

    #[test]
    fn view_excludes_marked_messages() {
        let mut store = store_with(vec![Message::user("old"), Message::user("new")]);
        let old_id = store.as_slice()[0].id.clone();
        let _ = store.mark_messages(&[old_id], Mark::Compressed);

        let filtered = store.view(Some(Mark::Compressed), false);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].text(), "new");

        // Without exclusion the marked message is still there
        assert_eq!(store.view(None, false).len(), 2);
    }

    #[test]
    fn view_prepends_summary_when_present() {
        let mut store = store_with(vec![Message::user("hi")]);
        store.set_summary("the story so far");

        let view = store.view(None, true);
        assert_eq!(view.len(), 2);
        assert!(view[0].is_system());
        assert!(view[0].text().starts_with(SUMMARY_PREFIX));
        assert!(view[0].text().contains("the story so far"));
    }

    #[test]
    fn view_omits_summary_prefix_when_empty() {
        let store = store_with(vec![Message::user("hi")]);
        assert_eq!(store.view(None, true).len(), 1);
    }

    #[test]
    fn view_omits_summary_prefix_when_not_requested() {
        let mut store = store_with(vec![Message::user("hi")]);
        store.set_summary("summary");
        assert_eq!(store.view(None, false).len(), 1);
    }

    // -- mark_messages --

    #[test]
    fn mark_messages_counts_newly_marked_only() {
        let mut store = store_with(vec![Message::user("a"), Message::user("b")]);
        let ids: Vec<MessageId> = store.as_slice().iter().map(|m| m.id.clone()).collect();

        assert_eq!(store.mark_messages(&ids, Mark::Compressed), 2);
        // Marking again is a no-op
        assert_eq!(store.mark_messages(&ids, Mark::Compressed), 0);
    }

    #[test]
    fn mark_messages_ignores_unknown_ids() {
        let mut store = store_with(vec![Message::user("a")]);
        assert_eq!(
            store.mark_messages(&[MessageId::from("nope")], Mark::Compressed),
            0
        );
    }

    #[test]
    fn leading_system_run_never_marked() {
        let mut store = store_with(vec![Message::system("preamble"), Message::user("hi")]);
        let ids: Vec<MessageId> = store.as_slice().iter().map(|m| m.id.clone()).collect();

        assert_eq!(store.mark_messages(&ids, Mark::Compressed), 1);
        assert!(!store.as_slice()[0].has_mark(Mark::Compressed));
        assert!(store.as_slice()[1].has_mark(Mark::Compressed));
    }

    // -- summary --

    #[test]
    fn set_summary_replaces_not_appends() {
        let mut store = TranscriptStore::new();
        store.set_summary("first");
        store.set_summary("second");
        assert_eq!(store.summary(), "second");
    }

    // -- sanitize_in_place --

    #[test]
    fn sanitize_in_place_reports_no_change_for_valid_transcript() {
        let mut store = store_with(vec![
            Message::system("preamble"),
            Message::user("hi"),
            Message::invocation("a", "search", Map::new()),
            Message::outcome("a", json!("ok")),
        ]);
        assert!(!store.sanitize_in_place());
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn sanitize_in_place_deletes_unpaired() {
        let mut store = store_with(vec![
            Message::user("hi"),
            Message::invocation("7", "search", Map::new()),
            Message::user("unrelated"),
        ]);
        assert!(store.sanitize_in_place());
        let texts: Vec<String> = store.as_slice().iter().map(Message::text).collect();
        assert_eq!(texts, vec!["hi", "unrelated"]);
        // Token cache tracks the surviving messages
        assert_eq!(store.cached_tokens(2), None);
    }

    #[test]
    fn sanitize_in_place_skips_marked_messages() {
        // A marked message with a dangling invocation must survive: it is
        // excluded from the model view anyway.
        let mut store = store_with(vec![
            Message::system("preamble"),
            Message::invocation("old", "search", Map::new()),
            Message::user("live"),
        ]);
        let dangling_id = store.as_slice()[1].id.clone();
        let _ = store.mark_messages(std::slice::from_ref(&dangling_id), Mark::Compressed);

        assert!(!store.sanitize_in_place());
        assert_eq!(store.len(), 3);
        assert_eq!(store.as_slice()[1].id, dangling_id);
    }

    #[test]
    fn sanitize_in_place_detects_reorder_as_change() {
        let mut store = store_with(vec![
            Message::invocation("a", "search", Map::new()),
            Message::assistant("interleaved"),
            Message::outcome("a", json!("ok")),
        ]);
        assert!(store.sanitize_in_place());
        assert_eq!(store.len(), 3);
        assert!(store.as_slice()[1].has_outcomes());
    }

    // -- clear --

    #[test]
    fn clear_discards_everything() {
        let mut store = store_with(vec![Message::user("a"), Message::user("b")]);
        store.set_summary("summary");
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.summary(), "");
        assert_eq!(store.estimated_tokens(), 0);
    }
}
