//! Transcript message model.
//!
//! A [`Message`] is one entry in a conversation transcript: a role, an
//! ordered sequence of content blocks, and a set of marks. Everything except
//! the mark set is immutable after construction: mutating marks never
//! changes ordering or content, and marks are additive (a mark is never
//! removed over a message's lifetime).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::content::{ContentBlock, extract_text};
use crate::ids::MessageId;

// ─────────────────────────────────────────────────────────────────────────────
// Role and marks
// ─────────────────────────────────────────────────────────────────────────────

/// The author role of a transcript message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System preamble.
    System,
    /// End-user input (including tool outcomes returned to the model).
    User,
    /// Model output.
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// An additive tag on a message, used to exclude it from the model-facing
/// view without deleting it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mark {
    /// The message has been folded into the running compressed summary.
    Compressed,
}

// ─────────────────────────────────────────────────────────────────────────────
// Message
// ─────────────────────────────────────────────────────────────────────────────

/// One transcript entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Opaque identifier (UUID v7).
    pub id: MessageId,
    /// Author role.
    pub role: Role,
    /// Ordered content blocks.
    pub blocks: Vec<ContentBlock>,
    /// Marks attached to this message. Only ever grows.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    marks: Vec<Mark>,
}

impl Message {
    /// Create a message with the given role and blocks.
    #[must_use]
    pub fn with_blocks(role: Role, blocks: Vec<ContentBlock>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            blocks,
            marks: Vec::new(),
        }
    }

    /// Create a system text message.
    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self::with_blocks(Role::System, vec![ContentBlock::text(text)])
    }

    /// Create a user text message.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::with_blocks(Role::User, vec![ContentBlock::text(text)])
    }

    /// Create an assistant text message.
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::with_blocks(Role::Assistant, vec![ContentBlock::text(text)])
    }

    /// Create an assistant message carrying a single tool invocation.
    #[must_use]
    pub fn invocation(
        call_id: impl Into<String>,
        name: impl Into<String>,
        arguments: Map<String, Value>,
    ) -> Self {
        Self::with_blocks(
            Role::Assistant,
            vec![ContentBlock::invocation(call_id, name, arguments)],
        )
    }

    /// Create a user message carrying a single tool outcome.
    #[must_use]
    pub fn outcome(call_id: impl Into<String>, payload: Value) -> Self {
        Self::with_blocks(Role::User, vec![ContentBlock::outcome(call_id, payload)])
    }

    // ── Predicates ───────────────────────────────────────────────────────

    /// Returns `true` if this is a system message.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }

    /// Returns `true` if this is a user message.
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    /// Returns `true` if this is an assistant message.
    #[must_use]
    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    // ── Marks ────────────────────────────────────────────────────────────

    /// The marks currently attached to this message.
    #[must_use]
    pub fn marks(&self) -> &[Mark] {
        &self.marks
    }

    /// Returns `true` if the message carries the given mark.
    #[must_use]
    pub fn has_mark(&self, mark: Mark) -> bool {
        self.marks.contains(&mark)
    }

    /// Attach a mark. Returns `true` if the mark was newly added.
    ///
    /// Marks are additive; there is no removal operation.
    pub fn add_mark(&mut self, mark: Mark) -> bool {
        if self.marks.contains(&mark) {
            false
        } else {
            self.marks.push(mark);
            true
        }
    }

    // ── Tool block accessors ─────────────────────────────────────────────

    /// Call IDs of all invocation blocks, in block order.
    ///
    /// Duplicates are preserved; the sanitizer's dedup pass removes them
    /// before any pairing pass runs.
    #[must_use]
    pub fn invocation_ids(&self) -> Vec<&str> {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolInvocation { call_id, .. } => Some(call_id.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Call IDs of all outcome blocks, unique, in first-occurrence order.
    #[must_use]
    pub fn outcome_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for block in &self.blocks {
            if let ContentBlock::ToolOutcome { call_id, .. } = block {
                if !ids.contains(&call_id.as_str()) {
                    ids.push(call_id);
                }
            }
        }
        ids
    }

    /// Returns `true` if the message carries any invocation block.
    #[must_use]
    pub fn has_invocations(&self) -> bool {
        self.blocks.iter().any(ContentBlock::is_invocation)
    }

    /// Returns `true` if the message carries any outcome block.
    #[must_use]
    pub fn has_outcomes(&self) -> bool {
        self.blocks.iter().any(ContentBlock::is_outcome)
    }

    // ── Text ─────────────────────────────────────────────────────────────

    /// Concatenated text of all text blocks.
    #[must_use]
    pub fn text(&self) -> String {
        extract_text(&self.blocks)
    }

    /// Text truncated to `max_chars`, with an ellipsis when cut.
    #[must_use]
    pub fn text_preview(&self, max_chars: usize) -> String {
        let text = self.text();
        if text.chars().count() <= max_chars {
            text
        } else {
            let cut: String = text.chars().take(max_chars).collect();
            format!("{cut}...")
        }
    }
}

/// Length of the leading run of consecutive system-role messages.
///
/// This prefix is the conversation preamble: never pruned, deduplicated,
/// marked, or folded.
#[must_use]
pub fn leading_system_len(messages: &[Message]) -> usize {
    messages.iter().take_while(|m| m.is_system()).count()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
