//! Serve command - run a broadcast relay that accepts WebSocket clients.
//!
//! This is a minimal chat server for testing clients locally. Every `chat`
//! frame a client sends is re-broadcast verbatim to all connected clients,
//! the sender included. Nothing is stored; late joiners see no history.

use anyhow::{Context, Result};
use chat_types::Frame;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;

/// Frames buffered per client before a slow client starts missing some.
const BROADCAST_CAPACITY: usize = 256;

/// Run the serve command.
pub async fn run(bind: &str) -> Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    let local_addr = listener.local_addr()?;

    println!("Relay listening on ws://{}", local_addr);
    println!("Press Ctrl+C to stop.");

    let (relay, _) = broadcast::channel::<String>(BROADCAST_CAPACITY);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!("Accept failed: {}", e);
                        continue;
                    }
                };
                let relay = relay.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, peer, relay).await {
                        tracing::warn!("Client {} error: {:#}", peer, e);
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down relay.");
                return Ok(());
            }
        }
    }
}

/// Relay frames between one client and everyone else.
async fn handle_client(
    stream: TcpStream,
    peer: SocketAddr,
    relay: broadcast::Sender<String>,
) -> Result<()> {
    let ws = tokio_tungstenite::accept_async(stream)
        .await
        .context("WebSocket handshake failed")?;
    let (mut sink, mut source) = ws.split();
    let mut inbox = relay.subscribe();

    tracing::info!("Client {} connected", peer);

    loop {
        tokio::select! {
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => match Frame::from_bytes(text.as_bytes()) {
                    Ok(frame) => {
                        let Frame::Chat(event) = &frame;
                        tracing::debug!(
                            "{} says {:?} on {} via {}",
                            event.username,
                            event.body,
                            frame.channel(),
                            peer
                        );
                        // Fails only without subscribers, and this client is one
                        let _ = relay.send(text);
                    }
                    Err(e) => tracing::debug!("Ignoring frame from {}: {}", peer, e),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e).context("Receive failed"),
            },
            outgoing = inbox.recv() => match outgoing {
                Ok(text) => sink
                    .send(Message::Text(text))
                    .await
                    .context("Send failed")?,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!("Client {} missed {} frames", peer, missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    tracing::info!("Client {} disconnected", peer);
    Ok(())
}
