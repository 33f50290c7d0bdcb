//! Content block types.
//!
//! These are the primitive building blocks that appear inside transcript
//! messages. A closed tagged union with exactly three kinds: plain text,
//! tool invocations, and tool outcomes. Exhaustive matching replaces the
//! runtime key-presence checks of the original dynamic block dictionaries.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A content block within a transcript message.
///
/// Invocations and outcomes correlate through `call_id`: every surviving
/// invocation must be followed by outcomes for the same id before any other
/// invocation interleaves (pairing integrity, enforced by the sanitizer).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    /// Plain text.
    #[serde(rename = "text")]
    Text {
        /// The text.
        text: String,
    },
    /// A tool invocation emitted by the assistant.
    #[serde(rename = "tool_invocation")]
    ToolInvocation {
        /// Correlating call ID.
        #[serde(rename = "callId")]
        call_id: String,
        /// Tool name.
        name: String,
        /// Tool arguments (JSON object).
        arguments: Map<String, Value>,
    },
    /// The result payload for an invocation with the same call ID.
    #[serde(rename = "tool_outcome")]
    ToolOutcome {
        /// Correlating call ID.
        #[serde(rename = "callId")]
        call_id: String,
        /// Result payload.
        payload: Value,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Convenience constructors and predicates
// ─────────────────────────────────────────────────────────────────────────────

impl ContentBlock {
    /// Create a text block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create a tool invocation block.
    #[must_use]
    pub fn invocation(
        call_id: impl Into<String>,
        name: impl Into<String>,
        arguments: Map<String, Value>,
    ) -> Self {
        Self::ToolInvocation {
            call_id: call_id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Create a tool outcome block.
    #[must_use]
    pub fn outcome(call_id: impl Into<String>, payload: Value) -> Self {
        Self::ToolOutcome {
            call_id: call_id.into(),
            payload,
        }
    }

    /// Returns `true` if this is a text block.
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text { .. })
    }

    /// Returns `true` if this is a tool invocation block.
    #[must_use]
    pub fn is_invocation(&self) -> bool {
        matches!(self, Self::ToolInvocation { .. })
    }

    /// Returns `true` if this is a tool outcome block.
    #[must_use]
    pub fn is_outcome(&self) -> bool {
        matches!(self, Self::ToolOutcome { .. })
    }

    /// Returns the text if this is a text block, `None` otherwise.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Returns the call ID if this block carries one, `None` for text.
    #[must_use]
    pub fn call_id(&self) -> Option<&str> {
        match self {
            Self::Text { .. } => None,
            Self::ToolInvocation { call_id, .. } | Self::ToolOutcome { call_id, .. } => {
                Some(call_id)
            }
        }
    }
}

/// Extract the concatenated text of all text blocks.
#[must_use]
pub fn extract_text(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .filter_map(ContentBlock::as_text)
        .collect::<Vec<_>>()
        .join("\n")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
