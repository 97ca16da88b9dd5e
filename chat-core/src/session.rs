//! Session gate for chatsync.
//!
//! Holds the current identity and decides whether the synchronization core
//! is active. The identity is an explicit value owned here and lent by
//! reference to whoever needs it; nothing reads it from ambient storage.

use chat_types::Identity;

use crate::CoreError;

/// Two-state gate: logged out, or logged in as a specific identity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionGate {
    /// No identity; the chat core must stay inert.
    #[default]
    LoggedOut,
    /// Active session for this identity.
    LoggedIn(Identity),
}

impl SessionGate {
    /// Create a gate in the `LoggedOut` state.
    pub fn new() -> Self {
        Self::LoggedOut
    }

    /// Transition `LoggedOut -> LoggedIn(identity)`.
    ///
    /// Fails with [`CoreError::InvalidIdentity`] for an empty username and
    /// with [`CoreError::AlreadyActive`] if a session is already open. The
    /// gate is unchanged on failure.
    pub fn activate(&mut self, identity: Identity) -> Result<(), CoreError> {
        if let Self::LoggedIn(current) = self {
            return Err(CoreError::AlreadyActive {
                username: current.username.clone(),
            });
        }
        identity.validate().map_err(|_| CoreError::InvalidIdentity)?;
        *self = Self::LoggedIn(identity);
        Ok(())
    }

    /// Transition `LoggedIn(_) -> LoggedOut`.
    ///
    /// Idempotent: returns the identity that was cleared, or `None` if the
    /// gate was already logged out.
    pub fn deactivate(&mut self) -> Option<Identity> {
        match std::mem::take(self) {
            Self::LoggedIn(identity) => Some(identity),
            Self::LoggedOut => None,
        }
    }

    /// The active identity, if any.
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::LoggedIn(identity) => Some(identity),
            Self::LoggedOut => None,
        }
    }

    /// The active identity, or [`CoreError::NotActive`].
    pub fn require_active(&self) -> Result<&Identity, CoreError> {
        self.identity().ok_or(CoreError::NotActive)
    }

    /// Check if a session is active.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::LoggedIn(_))
    }
}
