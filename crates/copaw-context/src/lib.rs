//! # copaw-context
//!
//! Transcript integrity and compaction for the CoPaw agent runtime.
//!
//! The engine keeps a conversation transcript structurally valid and bounded
//! over an unbounded conversation:
//!
//! - [`sanitizer`] repairs tool invocation/outcome pairing violations before
//!   every model call (dedup → fast check → reorder → prune).
//! - [`compaction`] folds the older middle of the transcript into a running
//!   summary when it outgrows its token budget, never splitting a tool
//!   exchange and never touching the system prefix.
//! - [`transcript`] is the ordered sequence both operate on: append,
//!   mark-filtered views, summary chaining.
//!
//! Summarization and token counting are external collaborators, expressed
//! as the [`summarizer::Summarizer`] and [`token_count::TokenCounter`]
//! traits.

#![deny(unsafe_code)]

pub mod compaction;
pub mod constants;
pub mod sanitizer;
pub mod summarizer;
pub mod token_count;
pub mod token_estimator;
pub mod transcript;

pub use compaction::{BackgroundSummaries, CompactionOutcome, CompactionPolicy, SkipReason};
pub use sanitizer::{is_pairing_valid, sanitize};
pub use summarizer::{Summarizer, SummarizerError};
pub use token_count::{HeuristicTokenCounter, TokenCountError, TokenCounter};
pub use transcript::TranscriptStore;
