//! # chat-core
//!
//! Pure logic for chatsync (no I/O, instant tests).
//!
//! This crate implements the state machines behind the real-time chat
//! client without any network I/O, enabling fast unit tests.
//!
//! ## Components
//!
//! - [`SessionGate`] - whether the chat core is active, and as whom
//! - [`Conversation`] - the ordered message sequence, optimistic sends and
//!   reconciliation with broadcast echoes
//! - [`LinkState`] - connection lifecycle with an optional reconnect policy
//!
//! The actual I/O (opening connections, sending frames) is performed by
//! `chat-client`, which interprets the actions produced by these machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod conversation;
pub mod error;
pub mod link;
pub mod session;

pub use conversation::{Applied, Composed, Conversation, EchoPolicy, Message, MessageStatus};
pub use error::CoreError;
pub use link::{LinkAction, LinkEvent, LinkState, ReconnectPolicy};
pub use session::SessionGate;
