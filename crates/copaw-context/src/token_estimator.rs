//! Token estimation utilities.
//!
//! Pure functions for estimating token counts from messages, using a
//! chars/4 approximation. This is the fallback used when the external token
//! counting collaborator fails; it is also cheap enough to run on every
//! append for the transcript store's token cache.

use copaw_core::content::ContentBlock;
use copaw_core::message::{Message, Role};

use crate::constants::CHARS_PER_TOKEN;

/// Shorthand for chars → tokens conversion.
#[allow(clippy::cast_possible_truncation)]
fn chars_to_tokens(chars: usize) -> u64 {
    chars.div_ceil(CHARS_PER_TOKEN) as u64
}

/// Estimate character count for a content block.
fn estimate_block_chars(block: &ContentBlock) -> usize {
    match block {
        ContentBlock::Text { text } => text.len(),
        ContentBlock::ToolInvocation {
            call_id,
            name,
            arguments,
        } => {
            let args_str = serde_json::to_string(arguments).unwrap_or_default();
            call_id.len() + name.len() + args_str.len()
        }
        ContentBlock::ToolOutcome { call_id, payload } => {
            call_id.len() + payload.to_string().len()
        }
    }
}

/// Estimate tokens for a single message.
///
/// Includes overhead for role and message structure (~10 chars).
#[must_use]
pub fn estimate_message_tokens(message: &Message) -> u64 {
    let role_str = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    let mut chars = role_str.len() + 10;
    for block in &message.blocks {
        chars += estimate_block_chars(block);
    }
    chars_to_tokens(chars)
}

/// Estimate tokens for a sequence of messages.
#[must_use]
pub fn estimate_messages_tokens(messages: &[Message]) -> u64 {
    messages.iter().map(estimate_message_tokens).sum()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    // ── chars_to_tokens ──────────────────────────────────────────────────

    #[test]
    fn chars_to_tokens_exact() {
        assert_eq!(chars_to_tokens(8), 2);
        assert_eq!(chars_to_tokens(100), 25);
    }

    #[test]
    fn chars_to_tokens_rounds_up() {
        assert_eq!(chars_to_tokens(9), 3);
        assert_eq!(chars_to_tokens(1), 1);
    }

    #[test]
    fn chars_to_tokens_zero() {
        assert_eq!(chars_to_tokens(0), 0);
    }

    // ── Message estimation ───────────────────────────────────────────────

    #[test]
    fn user_text_message() {
        let msg = Message::user("Hello, how are you?");
        // "user"(4) + 10 + 19 = 33, ceil(33/4) = 9
        assert_eq!(estimate_message_tokens(&msg), 9);
    }

    #[test]
    fn assistant_text_message() {
        let msg = Message::assistant("Hi there!");
        // "assistant"(9) + 10 + 9 = 28, ceil(28/4) = 7
        assert_eq!(estimate_message_tokens(&msg), 7);
    }

    #[test]
    fn outcome_message() {
        let msg = Message::outcome("call-1", json!("result data"));
        // "user"(4) + 10 + "call-1"(6) + "\"result data\""(13) = 33, ceil = 9
        assert_eq!(estimate_message_tokens(&msg), 9);
    }

    #[test]
    fn invocation_message_counts_arguments() {
        let mut args = Map::new();
        let _ = args.insert("cmd".into(), json!("ls"));
        let msg = Message::invocation("call_1", "bash", args);
        // "assistant"(9) + 10 + "call_1"(6) + "bash"(4) + "{\"cmd\":\"ls\"}"(12) = 41
        assert_eq!(estimate_message_tokens(&msg), 11);
    }

    #[test]
    fn empty_message_still_has_overhead() {
        let msg = Message::user("");
        // "user"(4) + 10 = 14, ceil(14/4) = 4
        assert_eq!(estimate_message_tokens(&msg), 4);
    }

    #[test]
    fn longer_content_means_more_tokens() {
        let short = Message::user("hi");
        let long = Message::user("a".repeat(1000));
        assert!(estimate_message_tokens(&long) > estimate_message_tokens(&short));
    }

    // ── Sequence estimation ──────────────────────────────────────────────

    #[test]
    fn messages_tokens_empty() {
        assert_eq!(estimate_messages_tokens(&[]), 0);
    }

    #[test]
    fn messages_tokens_sums_individuals() {
        let messages = vec![Message::user("Hello"), Message::assistant("Hi!")];
        let total = estimate_messages_tokens(&messages);
        let sum: u64 = messages.iter().map(estimate_message_tokens).sum();
        assert_eq!(total, sum);
    }
}
