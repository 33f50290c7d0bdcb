//! # copaw-runtime
//!
//! The conversation runtime around the CoPaw transcript engine: the
//! single-writer [`Conversation`] surface (`prepare_context` plus the
//! `compact` / `new` / `clear` / `history` commands), the fire-and-forget
//! [`BackgroundSummaryQueue`], and the [`ConversationRegistry`] factory.

#![deny(unsafe_code)]

pub mod background;
pub mod commands;
pub mod conversation;
pub mod errors;
pub mod registry;

pub use background::{BackgroundSummary, BackgroundSummaryQueue};
pub use commands::{Command, CommandReply};
pub use conversation::Conversation;
pub use errors::RuntimeError;
pub use registry::{ConversationHandle, ConversationRegistry};
