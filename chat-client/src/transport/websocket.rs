//! WebSocket transport for chatsync.
//!
//! Frames travel as WebSocket text messages carrying the JSON encoding of
//! a [`chat_types::Frame`]. Binary messages are accepted on receive; ping
//! and pong are answered by tungstenite and never surface here.
//!
//! Only plain `ws://` endpoints are supported.

use super::{Transport, TransportError};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Configuration for the WebSocket transport.
#[derive(Debug, Clone)]
pub struct WebSocketTransportConfig {
    /// Timeout for the TCP connect plus WebSocket handshake.
    pub connect_timeout: Duration,
}

impl Default for WebSocketTransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// WebSocket transport.
///
/// The socket is split so that one task can wait in [`Transport::recv`]
/// while another calls [`Transport::send`].
pub struct WebSocketTransport {
    config: WebSocketTransportConfig,
    writer: Mutex<Option<SplitSink<WsStream, Message>>>,
    reader: Mutex<Option<SplitStream<WsStream>>>,
    connected: AtomicBool,
}

impl WebSocketTransport {
    /// Create a transport with the default configuration.
    pub fn new() -> Self {
        Self::with_config(WebSocketTransportConfig::default())
    }

    /// Create a transport with the given configuration.
    pub fn with_config(config: WebSocketTransportConfig) -> Self {
        Self {
            config,
            writer: Mutex::new(None),
            reader: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &WebSocketTransportConfig {
        &self.config
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        if !address.starts_with("ws://") {
            return Err(TransportError::ConnectionFailed(format!(
                "unsupported endpoint {address}: expected a ws:// URL"
            )));
        }

        tracing::debug!("Opening WebSocket to {}", address);
        let (stream, _response) = tokio::time::timeout(
            self.config.connect_timeout,
            tokio_tungstenite::connect_async(address),
        )
        .await
        .map_err(|_| TransportError::Timeout)?
        .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let (sink, source) = stream.split();
        *self.writer.lock().await = Some(sink);
        *self.reader.lock().await = Some(source);
        self.connected.store(true, Ordering::SeqCst);

        tracing::info!("WebSocket connected to {}", address);
        Ok(())
    }

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut guard = self.writer.lock().await;
        let sink = guard.as_mut().ok_or(TransportError::NotConnected)?;

        let message = match std::str::from_utf8(data) {
            Ok(text) => Message::Text(text.to_string()),
            Err(_) => Message::Binary(data.to_vec()),
        };

        if let Err(e) = sink.send(message).await {
            self.connected.store(false, Ordering::SeqCst);
            return Err(TransportError::SendFailed(e.to_string()));
        }
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let mut guard = self.reader.lock().await;
        let source = guard.as_mut().ok_or(TransportError::NotConnected)?;

        loop {
            match source.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.into_bytes()),
                Some(Ok(Message::Binary(data))) => return Ok(data),
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!("WebSocket closed by server: {:?}", frame);
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(TransportError::ConnectionClosed);
                }
                // Ping, pong and raw frames carry no chat data
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
                None => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(TransportError::ConnectionClosed);
                }
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);

        if let Some(mut sink) = self.writer.lock().await.take() {
            // The server may already be gone; a failed close frame is fine
            let _ = sink.close().await;
        }
        // Waits out any recv() still in flight; callers stop reading first
        self.reader.lock().await.take();

        tracing::debug!("WebSocket closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    #[test]
    fn default_config_has_thirty_second_timeout() {
        let config = WebSocketTransportConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn new_transport_is_disconnected() {
        let transport = WebSocketTransport::new();
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn send_before_connect_fails() {
        let transport = WebSocketTransport::new();
        let result = transport.send(b"{}").await;
        assert!(matches!(result, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn recv_before_connect_fails() {
        let transport = WebSocketTransport::new();
        let result = transport.recv().await;
        assert!(matches!(result, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn rejects_non_websocket_endpoint() {
        let transport = WebSocketTransport::new();
        let result = transport.connect("http://localhost:5000").await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn connect_to_closed_port_fails() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = WebSocketTransport::new();
        let result = transport.connect(&format!("ws://{addr}")).await;

        assert!(result.is_err());
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn close_after_cancelled_recv_releases_read_half() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let transport = Arc::new(WebSocketTransport::new());
        transport.connect(&format!("ws://{addr}")).await.unwrap();

        let reader = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move { transport.recv().await })
        };
        // Parked in recv() with the read half locked
        tokio::time::sleep(Duration::from_millis(20)).await;
        reader.abort();
        let _ = reader.await;

        transport.close().await.unwrap();

        assert!(transport.reader.lock().await.is_none());
        assert!(transport.writer.lock().await.is_none());
    }

    #[tokio::test]
    async fn close_when_disconnected_is_ok() {
        let transport = WebSocketTransport::new();
        transport.close().await.unwrap();
        assert!(!transport.is_connected());
    }
}
