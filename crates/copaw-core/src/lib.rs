//! # copaw-core
//!
//! Foundation types, branded IDs, and logging for the CoPaw transcript
//! engine.
//!
//! This crate provides the shared vocabulary the other CoPaw crates depend
//! on:
//!
//! - **Branded IDs**: [`ConversationId`], [`MessageId`] as newtypes for type
//!   safety
//! - **Messages**: [`Message`] with role, ordered content blocks, and an
//!   additive mark set
//! - **Content blocks**: [`ContentBlock`], a closed tagged union of text,
//!   tool invocations, and tool outcomes
//! - **Logging**: [`logging::init_subscriber`] for `tracing` setup

#![deny(unsafe_code)]

pub mod content;
pub mod ids;
pub mod logging;
pub mod message;

pub use content::{ContentBlock, extract_text};
pub use ids::{ConversationId, MessageId};
pub use message::{Mark, Message, Role, leading_system_len};
