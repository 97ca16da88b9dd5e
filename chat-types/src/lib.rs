//! # chat-types
//!
//! Wire format types for the chatsync real-time chat protocol.
//!
//! This crate provides the foundational types used across all chatsync crates:
//! - [`Identity`] - Who is speaking (username + optional avatar reference)
//! - [`OriginTag`] - Client-generated correlation token for optimistic messages
//! - [`Frame`] / [`ChatEvent`] - JSON frames exchanged on the `chat` channel
//! - [`WireError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod messages;

pub use error::WireError;
pub use ids::OriginTag;
pub use messages::{ChatEvent, Frame, Identity, CHAT_CHANNEL};
