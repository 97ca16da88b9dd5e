//! # chat-client
//!
//! Client library for the chatsync real-time chat protocol.
//!
//! This is the main library that applications use to chat.
//!
//! ## Features
//!
//! - **Optimistic sends**: composed messages are visible immediately as
//!   pending and confirmed when the server's broadcast is observed
//! - **Echo reconciliation**: optional correlation tags so a sender sees
//!   its own message once instead of twice
//! - **Reconnect policy**: optional exponential backoff with jitter
//! - **Transport Abstraction**: Pluggable transport layer (WebSocket, mock)
//! - **Pure State Machines**: Uses chat-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use chatsync_client::{ChatClient, ClientConfig, WebSocketTransport};
//! use chat_types::Identity;
//!
//! let config = ClientConfig::default();
//! let mut client = ChatClient::new(config, WebSocketTransport::new());
//!
//! client.activate(Identity::new("alice")).await?;
//! client.compose_and_send("hello")?;
//!
//! while let Some(update) = client.next_update().await {
//!     // render client.conversation()
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod connection;
pub mod transport;

pub use client::{ChatClient, ClientError, ClientUpdate};
pub use config::{ClientConfig, ConfigError, ReconnectConfig};
pub use connection::{
    ConnectionError, ConnectionEvent, ConnectionHandle, ConnectionManager, Subscription,
};
pub use transport::{
    MockTransport, Transport, TransportError, WebSocketTransport, WebSocketTransportConfig,
};
