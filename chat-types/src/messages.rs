//! Protocol frames for chatsync.
//!
//! Every frame is a JSON object naming its channel and carrying a payload:
//!
//! ```json
//! {"channel": "chat", "payload": {"username": "alice", "avatarRef": null, "body": "hi"}}
//! ```
//!
//! The server treats each `chat` frame as an anonymous event and re-broadcasts
//! it verbatim to every connected client, including the sender.

use serde::{Deserialize, Deserializer, Serialize};

use crate::{OriginTag, WireError};

/// Name of the only channel the protocol defines.
pub const CHAT_CHANNEL: &str = "chat";

/// All possible protocol frames, keyed by channel name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "payload", rename_all = "snake_case")]
pub enum Frame {
    /// A chat message (client → server and server → client)
    Chat(ChatEvent),
}

impl Frame {
    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        serde_json::to_vec(self).map_err(WireError::Serialization)
    }

    /// Deserialize from JSON bytes.
    ///
    /// Frames on an unknown channel fail with [`WireError::Deserialization`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        serde_json::from_slice(bytes).map_err(WireError::Deserialization)
    }

    /// The channel this frame travels on.
    pub fn channel(&self) -> &'static str {
        match self {
            Frame::Chat(_) => CHAT_CHANNEL,
        }
    }
}

/// The `chat` channel payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEvent {
    /// Author's username
    pub username: String,
    /// Author's avatar reference (absent decodes as `None`)
    #[serde(default)]
    pub avatar_ref: Option<String>,
    /// Message text
    pub body: String,
    /// Correlation token, only attached in reconcile mode.
    ///
    /// Other clients may attach tags in their own format; anything that is
    /// not one of ours decodes as `None` so the event itself is kept.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_origin_tag"
    )]
    pub origin_tag: Option<OriginTag>,
}

fn lenient_origin_tag<'de, D>(deserializer: D) -> Result<Option<OriginTag>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(|s| s.parse().ok()))
}

impl ChatEvent {
    /// Build an event authored by `identity`, without a correlation token.
    pub fn new(identity: &Identity, body: impl Into<String>) -> Self {
        Self {
            username: identity.username.clone(),
            avatar_ref: identity.avatar_ref.clone(),
            body: body.into(),
            origin_tag: None,
        }
    }

    /// Attach a correlation token.
    pub fn with_origin_tag(mut self, tag: OriginTag) -> Self {
        self.origin_tag = Some(tag);
        self
    }

    /// Wrap this event in a `chat` frame.
    pub fn into_frame(self) -> Frame {
        Frame::Chat(self)
    }
}

/// The verified identity of the local user.
///
/// Supplied by the external login collaborator; immutable while a session
/// is active.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Display name; must not be empty
    pub username: String,
    /// Optional avatar reference (URL or asset key)
    #[serde(default)]
    pub avatar_ref: Option<String>,
}

impl Identity {
    /// Create an identity without an avatar.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            avatar_ref: None,
        }
    }

    /// Set the avatar reference.
    pub fn with_avatar(mut self, avatar_ref: impl Into<String>) -> Self {
        self.avatar_ref = Some(avatar_ref.into());
        self
    }

    /// Check that the username is present.
    ///
    /// Whitespace-only usernames count as empty.
    pub fn validate(&self) -> Result<(), WireError> {
        if self.username.trim().is_empty() {
            return Err(WireError::InvalidIdentity);
        }
        Ok(())
    }
}
