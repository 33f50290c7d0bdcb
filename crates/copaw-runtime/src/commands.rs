//! Conversation reset commands.
//!
//! A small explicit state machine driven by literal user commands sits above
//! the engine: `compact` forces a fold, `new` starts a fresh logical
//! conversation on the same store, `clear` hard-resets, `history` dumps the
//! current view. Commands always yield a human-readable acknowledgment; an
//! unrecognized command is a contract violation and errors instead.

use crate::errors::RuntimeError;

/// A recognized conversation command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Force-fold the compactable middle regardless of threshold.
    Compact,
    /// Fold the entire remainder and reset the summary: a fresh logical
    /// conversation layered on the same store.
    New,
    /// Discard the entire transcript and summary (hard reset).
    Clear,
    /// Read-only dump of the current view.
    History,
}

impl Command {
    /// Parse a command string, with or without a leading slash.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::UnknownCommand`] for anything else.
    pub fn parse(input: &str) -> Result<Self, RuntimeError> {
        let trimmed = input.trim();
        let name = trimmed.strip_prefix('/').unwrap_or(trimmed);
        match name {
            "compact" => Ok(Self::Compact),
            "new" => Ok(Self::New),
            "clear" => Ok(Self::Clear),
            "history" => Ok(Self::History),
            _ => Err(RuntimeError::UnknownCommand(trimmed.to_owned())),
        }
    }
}

/// Acknowledgment for a handled command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandReply {
    /// The command did something.
    Performed {
        /// Human-readable acknowledgment.
        text: String,
    },
    /// There was nothing to do (e.g. the transcript is empty). Idempotent.
    NothingToDo {
        /// Human-readable acknowledgment.
        text: String,
    },
}

impl CommandReply {
    /// The acknowledgment text shown to the user.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Performed { text } | Self::NothingToDo { text } => text,
        }
    }

    /// Returns `true` if the command was a no-op.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::NothingToDo { .. })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
