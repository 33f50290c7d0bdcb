//! Context subsystem constants.
//!
//! Shared constants for the token estimator, the summary view prefix, and
//! the summarizer transcript serialization.

// =============================================================================
// Token Estimation
// =============================================================================

/// Approximate characters per token, used by the heuristic fallback.
pub const CHARS_PER_TOKEN: usize = 4;

// =============================================================================
// Compressed Summary
// =============================================================================

/// Prefix for the synthetic summary message prepended to the model view.
pub const SUMMARY_PREFIX: &str = "[Summary of earlier conversation]";

// =============================================================================
// Summarizer serialization
// =============================================================================

/// Truncation limit for assistant text lines in the serialized transcript.
pub const SUMMARIZER_ASSISTANT_TEXT_LIMIT: usize = 300;

/// Truncation limit for tool outcome lines in the serialized transcript.
pub const SUMMARIZER_OUTCOME_TEXT_LIMIT: usize = 100;

/// Maximum serialized character length handed to a summarizer.
pub const SUMMARIZER_MAX_SERIALIZED_CHARS: usize = 150_000;
