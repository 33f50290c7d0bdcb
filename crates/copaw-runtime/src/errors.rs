//! Runtime error types.

use copaw_context::SummarizerError;

/// Errors surfaced by the conversation runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The synchronous summarization call failed during compaction.
    ///
    /// This is the one engine failure that propagates to the agent loop:
    /// marking without a usable summary would lose information. The caller
    /// may retry the whole reasoning step or surface the error to the user.
    #[error("summarization failed: {0}")]
    Summarizer(#[from] SummarizerError),

    /// An unrecognized command string: a programming-contract violation,
    /// fatal to that request and not retried.
    #[error("unknown command: {0}")]
    UnknownCommand(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
