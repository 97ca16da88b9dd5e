//! Connection lifecycle state machine for chatsync.
//!
//! This module provides a pure, side-effect-free state machine for the link
//! between the client and the chat server. The machine takes events as input
//! and produces a new state plus a list of actions to execute.
//!
//! The actual I/O (opening the transport, sleeping before a retry) is
//! performed by chat-client, not by this module. This enables instant unit
//! testing without network mocks.
//!
//! Every successful reconnect is a fresh session: there is no history
//! replay, so the conversation is reset when the replacement connection
//! comes up.

use std::time::Duration;

/// Link state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LinkState {
    /// No connection and none being attempted.
    #[default]
    Idle,
    /// Connection attempt in progress.
    Connecting {
        /// Reconnection attempt number (0 = first connection of a session).
        attempt: u32,
    },
    /// Connection is live.
    Connected {
        /// Generation of the live connection handle.
        generation: u64,
    },
    /// Connection lost, waiting to retry.
    Reconnecting {
        /// Number of reconnection attempts so far.
        attempt: u32,
    },
}

impl LinkState {
    /// Create a new state machine in the Idle state.
    pub fn new() -> Self {
        Self::Idle
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (chat-client)
    /// is responsible for executing the returned actions in order.
    pub fn on_event(self, event: LinkEvent, policy: &ReconnectPolicy) -> (Self, Vec<LinkAction>) {
        match (self, event) {
            // From Idle
            (Self::Idle, LinkEvent::OpenRequested) => (
                Self::Connecting { attempt: 0 },
                vec![LinkAction::ResetConversation, LinkAction::Open],
            ),
            (Self::Idle, LinkEvent::CloseRequested) => (Self::Idle, vec![]),

            // From Connecting
            (Self::Connecting { attempt }, LinkEvent::OpenSucceeded { generation }) => {
                let actions = if attempt > 0 {
                    vec![LinkAction::ResetConversation]
                } else {
                    vec![]
                };
                (Self::Connected { generation }, actions)
            }
            (Self::Connecting { attempt }, LinkEvent::OpenFailed { error }) => {
                retry_or_idle(attempt.saturating_add(1), error, policy, vec![])
            }
            (Self::Connecting { .. }, LinkEvent::CloseRequested) => (
                Self::Idle,
                vec![LinkAction::Close, LinkAction::ResetConversation],
            ),

            // From Connected
            (Self::Connected { generation }, LinkEvent::Dropped { generation: dropped, error })
                if dropped == generation =>
            {
                retry_or_idle(1, error, policy, vec![LinkAction::Close])
            }
            (Self::Connected { .. }, LinkEvent::CloseRequested) => (
                Self::Idle,
                vec![LinkAction::Close, LinkAction::ResetConversation],
            ),
            (Self::Connected { .. }, LinkEvent::OpenRequested) => (
                Self::Connecting { attempt: 0 },
                vec![
                    LinkAction::Close,
                    LinkAction::ResetConversation,
                    LinkAction::Open,
                ],
            ),

            // From Reconnecting
            (Self::Reconnecting { attempt }, LinkEvent::RetryTimerFired)
            | (Self::Reconnecting { attempt }, LinkEvent::OpenRequested) => (
                Self::Connecting { attempt },
                vec![LinkAction::CancelReconnect, LinkAction::Open],
            ),
            (Self::Reconnecting { .. }, LinkEvent::CloseRequested) => (
                Self::Idle,
                vec![LinkAction::CancelReconnect, LinkAction::ResetConversation],
            ),

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if the link is live.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// Generation of the live connection, if any.
    pub fn generation(&self) -> Option<u64> {
        match self {
            Self::Connected { generation } => Some(*generation),
            _ => None,
        }
    }
}

fn retry_or_idle(
    attempt: u32,
    error: String,
    policy: &ReconnectPolicy,
    mut actions: Vec<LinkAction>,
) -> (LinkState, Vec<LinkAction>) {
    if policy.allows(attempt) {
        actions.push(LinkAction::ScheduleReconnect {
            attempt,
            delay: policy.delay_for(attempt),
        });
        (LinkState::Reconnecting { attempt }, actions)
    } else {
        actions.push(LinkAction::GiveUp {
            attempts: attempt.saturating_sub(1),
            error,
        });
        (LinkState::Idle, actions)
    }
}

/// Events that can occur in the link lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Session activated, or the user asked for a manual reconnect.
    OpenRequested,
    /// Transport connection established.
    OpenSucceeded {
        /// Generation of the new connection handle.
        generation: u64,
    },
    /// Transport connection could not be established.
    OpenFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// A live connection was lost (refused, reset, closed by the server).
    Dropped {
        /// Generation of the connection that dropped.
        generation: u64,
        /// Error message describing the failure.
        error: String,
    },
    /// Session deactivated.
    CloseRequested,
    /// Reconnect delay elapsed.
    RetryTimerFired,
}

/// Actions to be executed by chat-client.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    /// Open a new connection (replacing any previous handle).
    Open,
    /// Close the current connection handle.
    Close,
    /// Discard the conversation.
    ResetConversation,
    /// Wait `delay`, then feed [`LinkEvent::RetryTimerFired`].
    ScheduleReconnect {
        /// Which reconnection attempt this will be.
        attempt: u32,
        /// Delay before attempting reconnection.
        delay: Duration,
    },
    /// Forget any scheduled reconnect.
    CancelReconnect,
    /// Stop trying; the link stays idle until a manual reconnect.
    GiveUp {
        /// Number of reconnection attempts made.
        attempts: u32,
        /// The last error seen.
        error: String,
    },
}

/// Reconnect policy applied after a connection fails or drops.
///
/// Disabled by default: a lost connection stays lost until the caller asks
/// for a reconnect. When enabled, the delay before attempt `n` is
/// `min(max_delay, base_delay * 2^(n-1))` plus random jitter in
/// `[0, max_jitter]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Whether automatic reconnection is attempted at all.
    pub enabled: bool,
    /// Delay before the first attempt.
    pub base_delay: Duration,
    /// Cap on the exponential part of the delay.
    pub max_delay: Duration,
    /// Upper bound on the random jitter added to each delay.
    pub max_jitter: Duration,
    /// Give up after this many attempts (`None` = retry forever).
    pub max_attempts: Option<u32>,
}

impl ReconnectPolicy {
    /// Never reconnect automatically.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::exponential()
        }
    }

    /// Exponential backoff: 2s, 4s, 8s ... capped at 30s, plus up to 5s jitter.
    pub fn exponential() -> Self {
        Self {
            enabled: true,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_secs(5),
            max_attempts: None,
        }
    }

    /// Set the attempt limit.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Set the jitter bound.
    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Check whether attempt number `attempt` (1-based) may be made.
    pub fn allows(&self, attempt: u32) -> bool {
        self.enabled && self.max_attempts.map_or(true, |max| attempt <= max)
    }

    /// Delay before attempt `attempt`, without jitter.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Delay before attempt `attempt`, with jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay_for(attempt) + random_jitter(self.max_jitter)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Generate random jitter between zero and `max` inclusive.
fn random_jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    let mut bytes = [0u8; 8];
    if getrandom::getrandom(&mut bytes).is_err() {
        return Duration::ZERO;
    }
    Duration::from_millis(u64::from_le_bytes(bytes) % (max_ms + 1))
}
