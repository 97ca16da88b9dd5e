//! Error types for chatsync wire handling.

use thiserror::Error;

/// Errors that can occur while encoding, decoding or validating wire data.
#[derive(Debug, Error)]
pub enum WireError {
    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// JSON deserialization failed (malformed JSON or unknown channel)
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// Identity is missing a username
    #[error("invalid identity: username must not be empty")]
    InvalidIdentity,
}
