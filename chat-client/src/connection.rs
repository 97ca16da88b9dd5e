//! Connection Manager for chatsync.
//!
//! Owns the single live transport session. Each [`ConnectionManager::open`]
//! produces a [`ConnectionHandle`] stamped with a fresh generation number;
//! opening again tears the previous session down first, so at most one
//! handle is ever valid.
//!
//! Two background tasks run per session:
//!
//! - a reader that decodes inbound frames and forwards them, along with
//!   transport errors, to the session's [`Subscription`]
//! - a writer that drains an unbounded queue of encoded frames, so
//!   [`ConnectionManager::send`] never waits on the network
//!
//! Closing a handle aborts both tasks and waits for them to stop before the
//! transport is closed. Anything still queued is dropped and the
//! subscription ends.

use std::sync::Arc;

use chat_types::{ChatEvent, Frame, WireError};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::transport::{Transport, TransportError};

/// Connection Manager errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The handle was closed or replaced by a newer one.
    #[error("connection handle is closed")]
    HandleClosed,

    /// The handle's event stream already has a subscriber.
    #[error("connection already has a subscriber")]
    AlreadySubscribed,

    /// The transport could not be opened.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The outbound event could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] WireError),
}

/// Identifies one live transport session.
///
/// Handles are cheap to copy; a handle becomes stale as soon as the session
/// it names is closed or replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle {
    generation: u64,
}

impl ConnectionHandle {
    /// Monotonic generation number of this session.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Something that happened on a transport session.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// A `chat` event arrived.
    Message(ChatEvent),
    /// An outbound frame could not be written. The session may still be
    /// usable; the frame is not retried.
    SendFailed(TransportError),
    /// The session is gone (refused, reset, closed by the server). No more
    /// events follow.
    Lost(TransportError),
}

/// Single-consumer stream of [`ConnectionEvent`]s for one session.
#[derive(Debug)]
pub struct Subscription {
    generation: u64,
    rx: mpsc::UnboundedReceiver<ConnectionEvent>,
}

impl Subscription {
    /// Wait for the next event.
    ///
    /// Returns `None` once the session is closed or replaced. Cancel-safe.
    pub async fn next(&mut self) -> Option<ConnectionEvent> {
        self.rx.recv().await
    }

    /// Generation of the session this subscription listens to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Detach from the session. Events arriving afterwards are discarded.
    pub fn cancel(mut self) {
        self.rx.close();
    }
}

struct ActiveConnection {
    generation: u64,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    events: Option<mpsc::UnboundedReceiver<ConnectionEvent>>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl ActiveConnection {
    fn abort(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Owner of the single live transport session.
pub struct ConnectionManager<T: Transport + 'static> {
    transport: Arc<T>,
    next_generation: u64,
    active: Option<ActiveConnection>,
}

impl<T: Transport + 'static> ConnectionManager<T> {
    /// Create a manager around `transport`. Nothing is opened yet.
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            next_generation: 1,
            active: None,
        }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Check whether `handle` names the live session.
    pub fn is_open(&self, handle: &ConnectionHandle) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.generation == handle.generation)
    }

    /// Open a session to `endpoint`, replacing any previous one.
    pub async fn open(&mut self, endpoint: &str) -> Result<ConnectionHandle, ConnectionError> {
        self.teardown().await;

        self.transport.connect(endpoint).await?;

        let generation = self.next_generation;
        self.next_generation += 1;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn(read_loop(
            Arc::clone(&self.transport),
            generation,
            events_tx.clone(),
        ));
        let writer = tokio::spawn(write_loop(
            Arc::clone(&self.transport),
            generation,
            outbound_rx,
            events_tx,
        ));

        self.active = Some(ActiveConnection {
            generation,
            outbound: outbound_tx,
            events: Some(events_rx),
            reader,
            writer,
        });

        tracing::info!("Connection {} open to {}", generation, endpoint);
        Ok(ConnectionHandle { generation })
    }

    /// Take the event stream of `handle`.
    ///
    /// Events that arrived between `open` and `subscribe` are buffered.
    pub fn subscribe(&mut self, handle: &ConnectionHandle) -> Result<Subscription, ConnectionError> {
        let active = self
            .active
            .as_mut()
            .filter(|active| active.generation == handle.generation)
            .ok_or(ConnectionError::HandleClosed)?;

        let rx = active
            .events
            .take()
            .ok_or(ConnectionError::AlreadySubscribed)?;

        Ok(Subscription {
            generation: handle.generation,
            rx,
        })
    }

    /// Queue `event` for sending on `handle`.
    ///
    /// Returns as soon as the frame is queued. Delivery is not guaranteed;
    /// write failures surface as [`ConnectionEvent::SendFailed`].
    pub fn send(&self, handle: &ConnectionHandle, event: &ChatEvent) -> Result<(), ConnectionError> {
        let active = self
            .active
            .as_ref()
            .filter(|active| active.generation == handle.generation)
            .ok_or(ConnectionError::HandleClosed)?;

        let bytes = Frame::Chat(event.clone()).to_bytes()?;
        active
            .outbound
            .send(bytes)
            .map_err(|_| ConnectionError::HandleClosed)
    }

    /// Close the session named by `handle`.
    ///
    /// A stale handle is ignored. Safe while sends are queued.
    pub async fn close(&mut self, handle: ConnectionHandle) {
        if self.is_open(&handle) {
            self.teardown().await;
        }
    }

    async fn teardown(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        let generation = active.generation;
        active.abort();
        // Cancelled tasks report a JoinError; all that matters is that they
        // no longer hold the transport's read or write half
        let _ = active.reader.await;
        let _ = active.writer.await;

        if let Err(e) = self.transport.close().await {
            tracing::warn!("Error closing connection {}: {}", generation, e);
        }
        tracing::info!("Connection {} closed", generation);
    }
}

impl<T: Transport + 'static> Drop for ConnectionManager<T> {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.abort();
        }
    }
}

impl<T: Transport + 'static> std::fmt::Debug for ConnectionManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("next_generation", &self.next_generation)
            .field("active", &self.active.as_ref().map(|a| a.generation))
            .finish()
    }
}

async fn read_loop<T: Transport>(
    transport: Arc<T>,
    generation: u64,
    events: mpsc::UnboundedSender<ConnectionEvent>,
) {
    loop {
        let event = match transport.recv().await {
            Ok(bytes) => match Frame::from_bytes(&bytes) {
                Ok(Frame::Chat(event)) => ConnectionEvent::Message(event),
                Err(e) => {
                    tracing::warn!("Connection {}: skipping undecodable frame: {}", generation, e);
                    continue;
                }
            },
            Err(e) => {
                tracing::warn!("Connection {} lost: {}", generation, e);
                let _ = events.send(ConnectionEvent::Lost(e));
                return;
            }
        };

        if events.send(event).is_err() {
            tracing::debug!("Connection {}: subscriber gone, reader stopping", generation);
            return;
        }
    }
}

async fn write_loop<T: Transport>(
    transport: Arc<T>,
    generation: u64,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
) {
    while let Some(bytes) = outbound.recv().await {
        if let Err(e) = transport.send(&bytes).await {
            tracing::warn!("Connection {}: send failed: {}", generation, e);
            let _ = events.send(ConnectionEvent::SendFailed(e));
        }
    }
}
