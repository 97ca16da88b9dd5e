//! Error type for chat-core.

use thiserror::Error;

/// Errors raised by the session gate and conversation state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Activation attempted with a missing or empty username.
    #[error("invalid identity: username must not be empty")]
    InvalidIdentity,

    /// Operation attempted while logged out.
    #[error("chat session is not active")]
    NotActive,

    /// Activation attempted while a session is already active.
    #[error("chat session is already active as {username}")]
    AlreadyActive {
        /// Username of the session currently holding the gate.
        username: String,
    },
}
