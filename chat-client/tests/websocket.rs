//! Loopback tests for the WebSocket transport against an in-process echo server.

use std::net::SocketAddr;
use std::time::Duration;

use chat_core::{EchoPolicy, MessageStatus};
use chat_types::{ChatEvent, Frame, Identity};
use chatsync_client::{ChatClient, ClientConfig, ClientUpdate, Transport, WebSocketTransport};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

/// Accept connections and reflect every text frame back to its sender.
///
/// With `close_after` set, the server closes each connection after that
/// many frames.
async fn spawn_echo_server(close_after: Option<usize>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let mut seen = 0;
                while let Some(Ok(msg)) = ws.next().await {
                    if let Message::Text(text) = msg {
                        if ws.send(Message::Text(text)).await.is_err() {
                            return;
                        }
                        seen += 1;
                        if close_after == Some(seen) {
                            let _ = ws.close(None).await;
                            return;
                        }
                    }
                }
            });
        }
    });

    addr
}

async fn next(client: &mut ChatClient<WebSocketTransport>) -> Option<ClientUpdate> {
    tokio::time::timeout(Duration::from_secs(5), client.next_update())
        .await
        .expect("timed out waiting for update")
}

#[tokio::test]
async fn transport_round_trips_text_frames() {
    let addr = spawn_echo_server(None).await;
    let transport = WebSocketTransport::new();
    transport.connect(&format!("ws://{addr}")).await.unwrap();
    assert!(transport.is_connected());

    let frame = ChatEvent::new(&Identity::new("alice"), "hi").into_frame();
    transport.send(&frame.to_bytes().unwrap()).await.unwrap();

    let bytes = transport.recv().await.unwrap();
    assert_eq!(Frame::from_bytes(&bytes).unwrap(), frame);

    transport.close().await.unwrap();
    assert!(!transport.is_connected());
}

#[tokio::test]
async fn client_sees_own_echo_twice() {
    let addr = spawn_echo_server(None).await;
    let config = ClientConfig::new(format!("ws://{addr}"));
    let mut client = ChatClient::new(config, WebSocketTransport::new());

    client.activate(Identity::new("alice")).await.unwrap();
    client.compose_and_send("hi").unwrap();

    assert_eq!(next(&mut client).await, Some(ClientUpdate::Appended { index: 1 }));
    let statuses: Vec<MessageStatus> = client
        .conversation()
        .messages()
        .iter()
        .map(|m| m.status)
        .collect();
    assert_eq!(statuses, vec![MessageStatus::Pending, MessageStatus::Confirmed]);

    assert!(client.deactivate().await);
    assert!(client.conversation().is_empty());
}

#[tokio::test]
async fn client_reconciles_own_echo() {
    let addr = spawn_echo_server(None).await;
    let config =
        ClientConfig::new(format!("ws://{addr}")).with_echo_policy(EchoPolicy::Reconcile);
    let mut client = ChatClient::new(config, WebSocketTransport::new());

    client.activate(Identity::new("alice")).await.unwrap();
    client.compose_and_send("hi").unwrap();

    assert_eq!(next(&mut client).await, Some(ClientUpdate::Confirmed { index: 0 }));
    assert_eq!(client.conversation().len(), 1);
}

#[tokio::test]
async fn server_close_is_reported() {
    let addr = spawn_echo_server(Some(1)).await;
    let config = ClientConfig::new(format!("ws://{addr}"));
    let mut client = ChatClient::new(config, WebSocketTransport::new());

    client.activate(Identity::new("bob")).await.unwrap();
    client.compose_and_send("last words").unwrap();

    assert_eq!(next(&mut client).await, Some(ClientUpdate::Appended { index: 1 }));
    assert!(matches!(
        next(&mut client).await,
        Some(ClientUpdate::ConnectionLost { .. })
    ));
    assert!(matches!(
        next(&mut client).await,
        Some(ClientUpdate::GaveUp { .. })
    ));
    assert!(!client.is_connected());
}

#[tokio::test]
async fn activate_against_closed_port_fails() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ClientConfig::new(format!("ws://{addr}"));
    let mut client = ChatClient::new(config, WebSocketTransport::new());

    assert!(client.activate(Identity::new("bob")).await.is_err());
    assert!(client.is_active());
    assert!(!client.is_connected());
}
