//! Summarizer trait and serialization utilities.
//!
//! Defines the [`Summarizer`] trait the compaction policy calls to fold the
//! compactable middle into the running summary, plus a line-based transcript
//! renderer for implementations to build their prompts from.
//!
//! The concrete LLM-backed summarizer lives with the surrounding
//! application; this engine only owns the seam.

use async_trait::async_trait;

use copaw_core::content::ContentBlock;
use copaw_core::message::{Message, Role};

use crate::constants::{
    SUMMARIZER_ASSISTANT_TEXT_LIMIT, SUMMARIZER_MAX_SERIALIZED_CHARS,
    SUMMARIZER_OUTCOME_TEXT_LIMIT,
};

// =============================================================================
// Summarizer trait
// =============================================================================

/// Generates a new summary from a message range and the previous summary.
///
/// The previous summary is chained in so each compaction event builds on the
/// last; the result replaces the stored summary, it is not appended.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize `messages`, folding in `previous_summary`.
    async fn summarize(
        &self,
        messages: &[Message],
        previous_summary: &str,
    ) -> Result<String, SummarizerError>;
}

/// Errors that can occur during summarization.
#[derive(Debug, thiserror::Error)]
pub enum SummarizerError {
    /// The summarization call failed.
    #[error("summarizer call failed: {message}")]
    CallFailed {
        /// Error message.
        message: String,
    },

    /// The summarization call timed out.
    #[error("summarizer timed out after {timeout_ms}ms")]
    Timeout {
        /// Timeout in milliseconds.
        timeout_ms: u64,
    },

    /// The summarizer returned an empty summary.
    #[error("summarizer returned empty output")]
    EmptyOutput,
}

// =============================================================================
// Message serialization
// =============================================================================

/// Serialize messages into a line-based transcript for a summarizer prompt.
///
/// Format:
/// ```text
/// [SYSTEM] text...
/// [USER] text...
/// [ASSISTANT] text... (truncated to 300 chars)
/// [TOOL_CALL] name(call_id)
/// [TOOL_RESULT] payload... (truncated to 100 chars)
/// ```
///
/// The result is capped at [`SUMMARIZER_MAX_SERIALIZED_CHARS`].
#[must_use]
pub fn serialize_messages(messages: &[Message]) -> String {
    let mut lines: Vec<String> = Vec::new();

    for msg in messages {
        let label = match msg.role {
            Role::System => "SYSTEM",
            Role::User => "USER",
            Role::Assistant => "ASSISTANT",
        };
        for block in &msg.blocks {
            match block {
                ContentBlock::Text { text } => {
                    if !text.is_empty() {
                        let t = truncate(text, SUMMARIZER_ASSISTANT_TEXT_LIMIT);
                        lines.push(format!("[{label}] {t}"));
                    }
                }
                ContentBlock::ToolInvocation { call_id, name, .. } => {
                    lines.push(format!("[TOOL_CALL] {name}({call_id})"));
                }
                ContentBlock::ToolOutcome { payload, .. } => {
                    let text = match payload {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    let t = truncate(&text, SUMMARIZER_OUTCOME_TEXT_LIMIT);
                    lines.push(format!("[TOOL_RESULT] {t}"));
                }
            }
        }
    }

    let mut full = lines.join("\n");
    full.truncate(floor_char_boundary(&full, SUMMARIZER_MAX_SERIALIZED_CHARS));
    full
}

/// Truncate a string to `max_len` chars, appending "..." if cut.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len).collect();
        format!("{cut}...")
    }
}

/// Largest index `<= max` that lands on a char boundary.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    let mut idx = max;
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
