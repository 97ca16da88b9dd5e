//! ChatClient - the main interface for chatsync.
//!
//! This module provides [`ChatClient`], the primary API for applications
//! to take part in a real-time chat.
//!
//! # Architecture
//!
//! ChatClient uses pure state machines (from chat-core) for session,
//! conversation and link logic, and interprets the link actions to perform
//! actual I/O via the [`ConnectionManager`].
//!
//! ```text
//! Application → ChatClient → ConnectionManager → Transport → Network
//!                   ↓
//!              chat-core (SessionGate, Conversation, LinkState)
//! ```
//!
//! All mutation happens through `&mut self`, so inbound events and local
//! sends are applied one at a time in the order the caller drives them.
//!
//! # Example
//!
//! ```ignore
//! use chatsync_client::{ChatClient, ClientConfig, MockTransport};
//! use chat_types::Identity;
//!
//! let mut client = ChatClient::new(ClientConfig::default(), MockTransport::echoing());
//! client.activate(Identity::new("alice")).await?;
//! client.compose_and_send("hi")?;
//!
//! while let Some(update) = client.next_update().await {
//!     println!("{update:?}");
//! }
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use chat_core::{
    Applied, CoreError, Conversation, LinkAction, LinkEvent, LinkState, ReconnectPolicy,
    SessionGate,
};
use chat_types::{ChatEvent, Identity, OriginTag};
use thiserror::Error;
use tokio::time::Instant;

use crate::config::ClientConfig;
use crate::connection::{
    ConnectionError, ConnectionEvent, ConnectionHandle, ConnectionManager, Subscription,
};
use crate::transport::Transport;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Session or conversation error.
    #[error("session error: {0}")]
    Core(#[from] CoreError),

    /// Connection error.
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),
}

/// Something the UI should react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientUpdate {
    /// A confirmed message was appended at `index`.
    Appended {
        /// Position in the conversation.
        index: usize,
    },
    /// The pending message at `index` was confirmed in place.
    Confirmed {
        /// Position in the conversation.
        index: usize,
    },
    /// An outbound frame was dropped by the transport. Its entry stays
    /// pending.
    SendFailed {
        /// Error message from the transport.
        error: String,
    },
    /// The live connection was lost.
    ConnectionLost {
        /// Error message from the transport.
        error: String,
    },
    /// A reconnect attempt is scheduled.
    Reconnecting {
        /// Attempt number (1-based).
        attempt: u32,
        /// Time until the attempt.
        delay: Duration,
    },
    /// A replacement connection is up. The conversation was reset.
    Reconnected,
    /// No further reconnects will be made. Call
    /// [`ChatClient::reconnect`] to try again.
    GaveUp {
        /// Reconnect attempts made.
        attempts: u32,
        /// The last error seen.
        error: String,
    },
}

impl From<Applied> for ClientUpdate {
    fn from(applied: Applied) -> Self {
        match applied {
            Applied::Appended { index } => ClientUpdate::Appended { index },
            Applied::Confirmed { index } => ClientUpdate::Confirmed { index },
        }
    }
}

enum Wake {
    Connection(u64, Option<ConnectionEvent>),
    RetryDue,
}

/// The main chat client.
///
/// Manages the session, the live connection and the conversation.
pub struct ChatClient<T: Transport + 'static> {
    config: ClientConfig,
    policy: ReconnectPolicy,
    gate: SessionGate,
    conversation: Conversation,
    link: LinkState,
    connection: ConnectionManager<T>,
    handle: Option<ConnectionHandle>,
    subscription: Option<Subscription>,
    retry_at: Option<Instant>,
    updates: VecDeque<ClientUpdate>,
}

impl<T: Transport + 'static> ChatClient<T> {
    /// Create a new ChatClient. Nothing is opened until [`activate`](Self::activate).
    pub fn new(config: ClientConfig, transport: T) -> Self {
        Self {
            policy: config.reconnect_policy(),
            conversation: Conversation::with_policy(config.echo_policy),
            config,
            gate: SessionGate::new(),
            link: LinkState::new(),
            connection: ConnectionManager::new(transport),
            handle: None,
            subscription: None,
            retry_at: None,
            updates: VecDeque::new(),
        }
    }

    /// Log in as `identity`: reset the conversation and open the connection.
    ///
    /// If the connection cannot be opened the session still becomes active
    /// and the error is returned; a retry is scheduled when the reconnect
    /// policy allows one, otherwise [`reconnect`](Self::reconnect) can be
    /// called later.
    pub async fn activate(&mut self, identity: Identity) -> Result<(), ClientError> {
        self.gate.activate(identity)?;
        tracing::info!(
            "Session active as {}",
            self.gate.identity().map_or("", |i| i.username.as_str())
        );

        match self.drive(LinkEvent::OpenRequested).await {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }

    /// Log out: close the connection and discard the conversation.
    ///
    /// Returns `false` if already logged out.
    pub async fn deactivate(&mut self) -> bool {
        let Some(identity) = self.gate.deactivate() else {
            return false;
        };

        self.drive(LinkEvent::CloseRequested).await;
        self.conversation.reset();
        self.updates.clear();
        self.retry_at = None;

        tracing::info!("Session for {} ended", identity.username);
        true
    }

    /// Compose a message and send it.
    ///
    /// The message is appended as pending before this returns, even when
    /// sending fails with [`ConnectionError::HandleClosed`].
    pub fn compose_and_send(&mut self, body: impl Into<String>) -> Result<OriginTag, ClientError> {
        let composed = self.conversation.compose(&self.gate, body)?;

        let handle = self
            .handle
            .filter(|handle| self.connection.is_open(handle))
            .ok_or(ConnectionError::HandleClosed)?;
        self.connection.send(&handle, &composed.event)?;

        tracing::debug!("Queued message {}", composed.origin_tag);
        Ok(composed.origin_tag)
    }

    /// Apply an event observed on the `chat` channel.
    ///
    /// [`next_update`](Self::next_update) calls this for every inbound
    /// event; it is public for callers that receive events some other way.
    pub fn on_inbound_event(&mut self, event: ChatEvent) -> Result<Applied, ClientError> {
        Ok(self.conversation.apply_inbound(&self.gate, event)?)
    }

    /// Wait for the next update.
    ///
    /// Applies inbound events, reports connection trouble and runs the
    /// reconnect timer. Returns `None` when there is nothing left to wait
    /// for: logged out, or the link is idle after a give-up.
    ///
    /// Cancel-safe, so it can be used as a `tokio::select!` branch.
    pub async fn next_update(&mut self) -> Option<ClientUpdate> {
        loop {
            if let Some(update) = self.updates.pop_front() {
                return Some(update);
            }
            if !self.gate.is_active() {
                return None;
            }

            // Resume work a cancelled call left unfinished
            if matches!(self.link, LinkState::Connecting { .. }) && self.handle.is_none() {
                self.apply(vec![LinkAction::Open]).await;
                continue;
            }
            if matches!(self.link, LinkState::Reconnecting { .. }) && self.retry_at.is_none() {
                self.retry_at = Some(Instant::now());
            }

            let wake = {
                let subscription = self.subscription.as_mut();
                let retry_at = self.retry_at;
                if subscription.is_none() && retry_at.is_none() {
                    return None;
                }

                tokio::select! {
                    (generation, event) = async move {
                        match subscription {
                            Some(s) => (s.generation(), s.next().await),
                            None => std::future::pending().await,
                        }
                    } => Wake::Connection(generation, event),
                    _ = async move {
                        match retry_at {
                            Some(at) => tokio::time::sleep_until(at).await,
                            None => std::future::pending().await,
                        }
                    } => Wake::RetryDue,
                }
            };

            match wake {
                Wake::Connection(generation, event) => {
                    if let Some(update) = self.handle_connection_event(generation, event).await {
                        return Some(update);
                    }
                }
                Wake::RetryDue => {
                    self.retry_at = None;
                    tracing::info!("Reconnecting to {}", self.config.endpoint);
                    self.drive(LinkEvent::RetryTimerFired).await;
                }
            }
        }
    }

    /// Drop the current connection (if any) and open a fresh one.
    ///
    /// The conversation is reset; there is no history replay.
    pub async fn reconnect(&mut self) -> Result<(), ClientError> {
        self.gate.require_active()?;

        match self.drive(LinkEvent::OpenRequested).await {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }

    /// The conversation.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// The active identity, if logged in.
    pub fn identity(&self) -> Option<&Identity> {
        self.gate.identity()
    }

    /// Check if logged in.
    pub fn is_active(&self) -> bool {
        self.gate.is_active()
    }

    /// Check if the connection is live.
    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Current link state.
    pub fn link_state(&self) -> &LinkState {
        &self.link
    }

    /// The configuration in use.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get a reference to the transport (useful for testing).
    pub fn transport(&self) -> &T {
        self.connection.transport()
    }

    async fn handle_connection_event(
        &mut self,
        generation: u64,
        event: Option<ConnectionEvent>,
    ) -> Option<ClientUpdate> {
        if self.link.generation() != Some(generation) {
            tracing::debug!("Dropping event from stale connection {}", generation);
            if self
                .subscription
                .as_ref()
                .is_some_and(|s| s.generation() == generation)
            {
                self.subscription = None;
            }
            return None;
        }

        match event {
            Some(ConnectionEvent::Message(event)) => match self.on_inbound_event(event) {
                Ok(applied) => Some(applied.into()),
                Err(e) => {
                    tracing::warn!("Inbound event not applied: {}", e);
                    None
                }
            },
            Some(ConnectionEvent::SendFailed(error)) => Some(ClientUpdate::SendFailed {
                error: error.to_string(),
            }),
            Some(ConnectionEvent::Lost(error)) => {
                self.connection_lost(generation, error.to_string()).await;
                None
            }
            None => {
                self.connection_lost(generation, "connection closed".to_string())
                    .await;
                None
            }
        }
    }

    async fn connection_lost(&mut self, generation: u64, error: String) {
        tracing::warn!("Connection to {} lost: {}", self.config.endpoint, error);
        self.updates.push_back(ClientUpdate::ConnectionLost {
            error: error.clone(),
        });
        self.drive(LinkEvent::Dropped { generation, error }).await;
    }

    /// Feed `event` to the link machine and execute the resulting actions.
    ///
    /// Returns the error of the last failed open, if any.
    async fn drive(&mut self, event: LinkEvent) -> Option<ConnectionError> {
        let actions = self.step(event);
        self.apply(actions).await
    }

    fn step(&mut self, event: LinkEvent) -> Vec<LinkAction> {
        let reconnected = matches!(event, LinkEvent::OpenSucceeded { .. })
            && matches!(self.link, LinkState::Connecting { attempt } if attempt > 0);

        let (state, actions) = std::mem::take(&mut self.link).on_event(event, &self.policy);
        self.link = state;

        if reconnected && self.link.is_connected() {
            tracing::info!("Reconnected to {}", self.config.endpoint);
            self.updates.push_back(ClientUpdate::Reconnected);
        }
        actions
    }

    async fn apply(&mut self, actions: Vec<LinkAction>) -> Option<ConnectionError> {
        let mut pending: VecDeque<LinkAction> = actions.into();
        let mut open_error = None;

        while let Some(action) = pending.pop_front() {
            let follow_up = match action {
                LinkAction::Open => match self.open().await {
                    Ok(generation) => {
                        open_error = None;
                        Some(LinkEvent::OpenSucceeded { generation })
                    }
                    Err(e) => {
                        tracing::warn!("Failed to connect to {}: {}", self.config.endpoint, e);
                        let error = e.to_string();
                        open_error = Some(e);
                        Some(LinkEvent::OpenFailed { error })
                    }
                },
                LinkAction::Close => {
                    self.close().await;
                    None
                }
                LinkAction::ResetConversation => {
                    self.conversation.reset();
                    None
                }
                LinkAction::ScheduleReconnect { attempt, delay } => {
                    tracing::info!("Reconnect attempt {} in {:?}", attempt, delay);
                    self.retry_at = Some(Instant::now() + delay);
                    self.updates
                        .push_back(ClientUpdate::Reconnecting { attempt, delay });
                    None
                }
                LinkAction::CancelReconnect => {
                    self.retry_at = None;
                    None
                }
                LinkAction::GiveUp { attempts, error } => {
                    tracing::warn!("Giving up after {} reconnect attempts: {}", attempts, error);
                    self.updates
                        .push_back(ClientUpdate::GaveUp { attempts, error });
                    None
                }
            };

            if let Some(event) = follow_up {
                pending.extend(self.step(event));
            }
        }

        open_error
    }

    async fn open(&mut self) -> Result<u64, ConnectionError> {
        self.handle = None;
        self.subscription = None;

        let handle = self.connection.open(&self.config.endpoint).await?;
        let subscription = self.connection.subscribe(&handle)?;
        self.handle = Some(handle);
        self.subscription = Some(subscription);
        Ok(handle.generation())
    }

    async fn close(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
        if let Some(handle) = self.handle.take() {
            self.connection.close(handle).await;
        }
    }
}

impl<T: Transport + 'static> std::fmt::Debug for ChatClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("endpoint", &self.config.endpoint)
            .field("gate", &self.gate)
            .field("link", &self.link)
            .field("messages", &self.conversation.len())
            .finish()
    }
}
