//! Conversation state machine for chatsync.
//!
//! Owns the ordered list of messages known to this client. Local sends are
//! appended optimistically as [`MessageStatus::Pending`]; events observed on
//! the `chat` channel are appended as [`MessageStatus::Confirmed`].
//!
//! # Ordering
//!
//! The sequence is append-only. Entries are never reordered or removed
//! (except by [`Conversation::reset`]), so the order of the sequence is the
//! order in which this client observed each local send or inbound event.
//! There is no logical clock and no server sequence number.
//!
//! # Echoes
//!
//! The server re-broadcasts every event to all clients, including the
//! sender. How the sender's own echo is handled depends on [`EchoPolicy`]:
//!
//! - [`EchoPolicy::Duplicate`] appends the echo like any other event, so the
//!   sender sees its message twice (once `Pending`, once `Confirmed`). The
//!   wire event carries no correlation token in this mode.
//! - [`EchoPolicy::Reconcile`] attaches the message's [`OriginTag`] to the
//!   outbound event; an inbound event carrying the tag of a still-`Pending`
//!   entry confirms that entry in place instead of appending.
//!
//! Every mutating entry point except [`Conversation::reset`] takes the
//! [`SessionGate`] and refuses to run while it is logged out, so stale
//! callbacks from a torn-down connection cannot modify state.

use chat_types::{ChatEvent, Identity, OriginTag};
use serde::{Deserialize, Serialize};

use crate::{CoreError, SessionGate};

/// Lifecycle of a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageStatus {
    /// Composed locally, broadcast not yet observed.
    ///
    /// May stay this way forever if the echo never arrives; that is a stale
    /// optimistic entry, not an error.
    Pending,
    /// Observed on the broadcast channel.
    Confirmed,
}

/// One entry in the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Author's username.
    pub author: String,
    /// Author's avatar reference.
    pub avatar_ref: Option<String>,
    /// Message text.
    pub body: String,
    /// Correlation token. Always set for local messages; set for inbound
    /// messages only when the wire event carried one.
    pub origin_tag: Option<OriginTag>,
    /// Lifecycle status.
    pub status: MessageStatus,
}

impl Message {
    fn pending(identity: &Identity, body: String, tag: OriginTag) -> Self {
        Self {
            author: identity.username.clone(),
            avatar_ref: identity.avatar_ref.clone(),
            body,
            origin_tag: Some(tag),
            status: MessageStatus::Pending,
        }
    }

    fn confirmed(event: ChatEvent) -> Self {
        Self {
            author: event.username,
            avatar_ref: event.avatar_ref,
            body: event.body,
            origin_tag: event.origin_tag,
            status: MessageStatus::Confirmed,
        }
    }

    /// Check if the broadcast for this message has not been observed yet.
    pub fn is_pending(&self) -> bool {
        self.status == MessageStatus::Pending
    }
}

/// How the sender's own broadcast echo is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EchoPolicy {
    /// Append every inbound event; the sender sees its own message twice.
    #[default]
    Duplicate,
    /// Tag outbound events and confirm the matching pending entry in place.
    Reconcile,
}

/// Result of composing a local message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composed {
    /// Position of the optimistic entry in the sequence.
    pub index: usize,
    /// Token assigned to the entry.
    pub origin_tag: OriginTag,
    /// Event to hand to the connection for sending.
    pub event: ChatEvent,
}

/// What an inbound event did to the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// A new confirmed entry was appended at `index`.
    Appended {
        /// Position of the new entry.
        index: usize,
    },
    /// The pending entry at `index` was flipped to confirmed.
    Confirmed {
        /// Position of the confirmed entry.
        index: usize,
    },
}

impl Applied {
    /// Position of the entry that changed.
    pub fn index(&self) -> usize {
        match self {
            Applied::Appended { index } | Applied::Confirmed { index } => *index,
        }
    }
}

/// Ordered, append-only message sequence.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    policy: EchoPolicy,
}

impl Conversation {
    /// Create an empty conversation with the default echo policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty conversation with the given echo policy.
    pub fn with_policy(policy: EchoPolicy) -> Self {
        Self {
            messages: Vec::new(),
            policy,
        }
    }

    /// The echo policy in effect.
    pub fn policy(&self) -> EchoPolicy {
        self.policy
    }

    /// Append an optimistic `Pending` message authored by the gate's identity.
    ///
    /// Returns the entry's position, its fresh [`OriginTag`] and the event to
    /// send. The tag is only attached to the event under
    /// [`EchoPolicy::Reconcile`].
    ///
    /// Fails with [`CoreError::NotActive`] while logged out, leaving the
    /// sequence untouched.
    pub fn compose(
        &mut self,
        gate: &SessionGate,
        body: impl Into<String>,
    ) -> Result<Composed, CoreError> {
        let identity = gate.require_active()?;
        let body = body.into();
        let origin_tag = OriginTag::new();

        let mut event = ChatEvent::new(identity, body.clone());
        if self.policy == EchoPolicy::Reconcile {
            event = event.with_origin_tag(origin_tag);
        }

        self.messages.push(Message::pending(identity, body, origin_tag));

        Ok(Composed {
            index: self.messages.len() - 1,
            origin_tag,
            event,
        })
    }

    /// Apply an event observed on the `chat` channel.
    ///
    /// Fails with [`CoreError::NotActive`] while logged out, leaving the
    /// sequence untouched.
    pub fn apply_inbound(
        &mut self,
        gate: &SessionGate,
        event: ChatEvent,
    ) -> Result<Applied, CoreError> {
        gate.require_active()?;

        if self.policy == EchoPolicy::Reconcile {
            if let Some(index) = event.origin_tag.and_then(|tag| self.find_pending(tag)) {
                self.messages[index].status = MessageStatus::Confirmed;
                return Ok(Applied::Confirmed { index });
            }
        }

        self.messages.push(Message::confirmed(event));
        Ok(Applied::Appended {
            index: self.messages.len() - 1,
        })
    }

    /// Discard every message.
    pub fn reset(&mut self) {
        self.messages.clear();
    }

    /// All messages, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The message at `index`.
    pub fn get(&self, index: usize) -> Option<&Message> {
        self.messages.get(index)
    }

    /// The most recent message.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if there are no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of messages still waiting for their broadcast.
    pub fn pending_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_pending()).count()
    }

    fn find_pending(&self, tag: OriginTag) -> Option<usize> {
        self.messages
            .iter()
            .rposition(|m| m.is_pending() && m.origin_tag == Some(tag))
    }
}
