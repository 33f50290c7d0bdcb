//! Token counting collaborator.
//!
//! The compaction policy asks an external counter for the token cost of the
//! compactable middle. Counting is allowed to fail: the policy degrades to
//! the chars/4 heuristic of [`crate::token_estimator`] rather than aborting
//! the step.

use copaw_core::message::Message;

use crate::token_estimator::estimate_messages_tokens;

/// Counts the token cost of a message sequence as the model backend would
/// see it (formatting included).
pub trait TokenCounter: Send + Sync {
    /// Count tokens for `messages`.
    fn count(&self, messages: &[Message]) -> Result<u64, TokenCountError>;
}

/// A token counting failure. Never propagated past the compaction policy.
#[derive(Debug, thiserror::Error)]
#[error("token counting failed: {message}")]
pub struct TokenCountError {
    /// Error message.
    pub message: String,
}

impl TokenCountError {
    /// Create a new error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Infallible counter backed by the chars/4 heuristic.
///
/// Useful as a default when no backend tokenizer is wired in.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeuristicTokenCounter;

impl TokenCounter for HeuristicTokenCounter {
    fn count(&self, messages: &[Message]) -> Result<u64, TokenCountError> {
        Ok(estimate_messages_tokens(messages))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_counter_matches_estimator() {
        let messages = vec![Message::user("hello there"), Message::assistant("hi")];
        let counted = HeuristicTokenCounter.count(&messages).unwrap();
        assert_eq!(counted, estimate_messages_tokens(&messages));
    }

    #[test]
    fn heuristic_counter_empty() {
        assert_eq!(HeuristicTokenCounter.count(&[]).unwrap(), 0);
    }

    #[test]
    fn error_display() {
        let err = TokenCountError::new("tokenizer crashed");
        assert!(err.to_string().contains("tokenizer crashed"));
    }
}
