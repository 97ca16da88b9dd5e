//! Mock transport for testing.
//!
//! Allows pushing inbound frames and capturing sent frames for verification.
//! With echo enabled, every sent frame is also delivered back as inbound,
//! the way the chat server broadcasts each event to its sender.

use super::{Transport, TransportError};
use async_trait::async_trait;
use chat_types::{ChatEvent, Frame};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Mock transport for testing.
///
/// Clones share state, so a test can keep one clone while the client owns
/// another.
#[derive(Debug, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
    wake: Arc<Notify>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    connected: bool,
    connected_address: Option<String>,
    connect_count: usize,
    echo: bool,
    sent_messages: Vec<Vec<u8>>,
    receive_queue: VecDeque<Vec<u8>>,
    fail_next_connect: Option<String>,
    fail_next_send: Option<String>,
    fail_next_recv: Option<String>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock transport that reflects every sent frame back.
    pub fn echoing() -> Self {
        let transport = Self::new();
        transport.set_echo(true);
        transport
    }

    /// Reflect sent frames back as inbound frames.
    pub fn set_echo(&self, echo: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.echo = echo;
    }

    /// Queue raw bytes to be returned by a `recv()` call.
    pub fn push_inbound(&self, data: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        inner.receive_queue.push_back(data);
        drop(inner);
        self.wake.notify_waiters();
    }

    /// Queue a chat event as if another client had sent it.
    pub fn push_chat(&self, event: &ChatEvent) {
        if let Ok(bytes) = Frame::Chat(event.clone()).to_bytes() {
            self.push_inbound(bytes);
        }
    }

    /// Get all frames that were sent.
    pub fn sent_messages(&self) -> Vec<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner.sent_messages.clone()
    }

    /// Decode every sent frame into its chat event.
    pub fn sent_events(&self) -> Vec<ChatEvent> {
        self.sent_messages()
            .iter()
            .filter_map(|bytes| match Frame::from_bytes(bytes) {
                Ok(Frame::Chat(event)) => Some(event),
                Err(_) => None,
            })
            .collect()
    }

    /// Get the address that was connected to.
    pub fn connected_address(&self) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.connected_address.clone()
    }

    /// Number of successful `connect()` calls.
    pub fn connect_count(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.connect_count
    }

    /// Cause the next connect() to fail with the given error.
    pub fn fail_next_connect(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_connect = Some(error.to_string());
    }

    /// Cause the next send() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_send = Some(error.to_string());
    }

    /// Cause the next recv() to fail with the given error.
    pub fn fail_next_recv(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_recv = Some(error.to_string());
        drop(inner);
        self.wake.notify_waiters();
    }

    /// Simulate the server dropping the connection.
    ///
    /// A pending `recv()` returns [`TransportError::ConnectionClosed`].
    pub fn drop_connection(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.connected = false;
        drop(inner);
        self.wake.notify_waiters();
    }
}

impl Clone for MockTransport {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            wake: Arc::clone(&self.wake),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();

        // Check for forced failure
        if let Some(error) = inner.fail_next_connect.take() {
            return Err(TransportError::ConnectionFailed(error));
        }

        inner.connected = true;
        inner.connected_address = Some(address.to_string());
        inner.connect_count += 1;
        inner.receive_queue.clear();
        Ok(())
    }

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }

        // Check for forced failure
        if let Some(error) = inner.fail_next_send.take() {
            return Err(TransportError::SendFailed(error));
        }

        inner.sent_messages.push(data.to_vec());
        if inner.echo {
            inner.receive_queue.push_back(data.to_vec());
            drop(inner);
            self.wake.notify_waiters();
        }
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        loop {
            // Register interest before checking, so a push in between is not missed
            let notified = self.wake.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut inner = self.inner.lock().unwrap();

                if !inner.connected {
                    return Err(if inner.connected_address.is_some() {
                        TransportError::ConnectionClosed
                    } else {
                        TransportError::NotConnected
                    });
                }

                // Check for forced failure
                if let Some(error) = inner.fail_next_recv.take() {
                    return Err(TransportError::ReceiveFailed(error));
                }

                if let Some(data) = inner.receive_queue.pop_front() {
                    return Ok(data);
                }
            }

            notified.await;
        }
    }

    fn is_connected(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.connected
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.connected = false;
        drop(inner);
        self.wake.notify_waiters();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_types::Identity;
    use std::time::Duration;

    // ===========================================
    // MockTransport Basic Tests
    // ===========================================

    #[tokio::test]
    async fn mock_transport_connects() {
        let transport = MockTransport::new();
        assert!(!transport.is_connected());

        transport.connect("ws://test").await.unwrap();

        assert!(transport.is_connected());
        assert_eq!(transport.connected_address(), Some("ws://test".to_string()));
        assert_eq!(transport.connect_count(), 1);
    }

    #[tokio::test]
    async fn mock_transport_sends_messages() {
        let transport = MockTransport::new();
        transport.connect("ws://test").await.unwrap();

        transport.send(b"message 1").await.unwrap();
        transport.send(b"message 2").await.unwrap();

        let sent = transport.sent_messages();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], b"message 1");
        assert_eq!(sent[1], b"message 2");
    }

    #[tokio::test]
    async fn mock_transport_receives_queued_messages() {
        let transport = MockTransport::new();
        transport.connect("ws://test").await.unwrap();

        transport.push_inbound(b"frame 1".to_vec());
        transport.push_inbound(b"frame 2".to_vec());

        assert_eq!(transport.recv().await.unwrap(), b"frame 1");
        assert_eq!(transport.recv().await.unwrap(), b"frame 2");
    }

    #[tokio::test]
    async fn recv_waits_for_data() {
        let transport = MockTransport::new();
        transport.connect("ws://test").await.unwrap();

        let waiting = tokio::time::timeout(Duration::from_millis(20), transport.recv()).await;
        assert!(waiting.is_err(), "recv should block on an empty queue");

        let pusher = transport.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            pusher.push_inbound(b"late".to_vec());
        });

        let data = tokio::time::timeout(Duration::from_secs(1), transport.recv())
            .await
            .expect("recv should wake when data is pushed")
            .unwrap();
        assert_eq!(data, b"late");
    }

    #[tokio::test]
    async fn echo_reflects_sent_frames() {
        let transport = MockTransport::echoing();
        transport.connect("ws://test").await.unwrap();

        transport.send(b"ping").await.unwrap();

        assert_eq!(transport.recv().await.unwrap(), b"ping");
    }

    #[tokio::test]
    async fn push_chat_encodes_frame() {
        let transport = MockTransport::new();
        transport.connect("ws://test").await.unwrap();
        let event = ChatEvent::new(&Identity::new("carol"), "hey");

        transport.push_chat(&event);

        let bytes = transport.recv().await.unwrap();
        assert_eq!(Frame::from_bytes(&bytes).unwrap(), Frame::Chat(event));
    }

    #[tokio::test]
    async fn sent_events_decodes_chat_frames() {
        let transport = MockTransport::new();
        transport.connect("ws://test").await.unwrap();
        let event = ChatEvent::new(&Identity::new("bob"), "hello");

        transport
            .send(&Frame::Chat(event.clone()).to_bytes().unwrap())
            .await
            .unwrap();
        transport.send(b"garbage").await.unwrap();

        assert_eq!(transport.sent_events(), vec![event]);
    }

    #[tokio::test]
    async fn mock_transport_closes() {
        let transport = MockTransport::new();
        transport.connect("ws://test").await.unwrap();
        assert!(transport.is_connected());

        transport.close().await.unwrap();
        assert!(!transport.is_connected());
    }

    // ===========================================
    // Error Condition Tests
    // ===========================================

    #[tokio::test]
    async fn send_without_connect_fails() {
        let transport = MockTransport::new();

        let result = transport.send(b"data").await;
        assert!(matches!(result, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn recv_without_connect_fails() {
        let transport = MockTransport::new();

        let result = transport.recv().await;
        assert!(matches!(result, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn dropped_connection_wakes_waiting_recv() {
        let transport = MockTransport::new();
        transport.connect("ws://test").await.unwrap();

        let dropper = transport.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            dropper.drop_connection();
        });

        let result = tokio::time::timeout(Duration::from_secs(1), transport.recv())
            .await
            .expect("recv should wake on drop");
        assert!(matches!(result, Err(TransportError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn forced_connect_failure() {
        let transport = MockTransport::new();
        transport.fail_next_connect("connection refused");

        let result = transport.connect("ws://test").await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
        assert!(!transport.is_connected());
        assert_eq!(transport.connect_count(), 0);
    }

    #[tokio::test]
    async fn forced_send_failure() {
        let transport = MockTransport::new();
        transport.connect("ws://test").await.unwrap();
        transport.fail_next_send("buffer full");

        let result = transport.send(b"data").await;
        assert!(matches!(result, Err(TransportError::SendFailed(_))));

        // Next send should work
        transport.send(b"data").await.unwrap();
    }

    #[tokio::test]
    async fn forced_recv_failure() {
        let transport = MockTransport::new();
        transport.connect("ws://test").await.unwrap();
        transport.push_inbound(b"data".to_vec());
        transport.fail_next_recv("reset by peer");

        let result = transport.recv().await;
        assert!(matches!(result, Err(TransportError::ReceiveFailed(_))));

        // Next recv should work (and get the queued data)
        assert_eq!(transport.recv().await.unwrap(), b"data");
    }

    // ===========================================
    // Clone and Shared State Tests
    // ===========================================

    #[tokio::test]
    async fn mock_transport_clone_shares_state() {
        let transport1 = MockTransport::new();
        let transport2 = transport1.clone();

        transport1.connect("ws://test").await.unwrap();
        assert!(transport2.is_connected());

        transport1.send(b"from t1").await.unwrap();
        transport2.send(b"from t2").await.unwrap();

        assert_eq!(transport1.sent_messages().len(), 2);
    }

    #[tokio::test]
    async fn reconnect_discards_stale_inbound() {
        let transport = MockTransport::new();
        transport.connect("ws://test").await.unwrap();
        transport.push_inbound(b"old session".to_vec());

        transport.connect("ws://test").await.unwrap();
        transport.push_inbound(b"new session".to_vec());

        assert_eq!(transport.recv().await.unwrap(), b"new session");
        assert_eq!(transport.connect_count(), 2);
    }
}
