//! Chat command - log in and exchange messages from the terminal.
//!
//! Each stdin line is sent as a message. `/quit` logs out and exits;
//! `/reconnect` drops the connection and opens a fresh one.

use anyhow::{Context, Result};
use chat_client::{
    ChatClient, ClientConfig, ClientError, ClientUpdate, MockTransport, Transport,
    WebSocketTransport,
};
use chat_core::{EchoPolicy, Message, MessageStatus};
use chat_types::Identity;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Options for the chat command.
#[derive(Debug)]
pub struct ChatOptions {
    pub username: String,
    pub avatar: Option<String>,
    pub endpoint: Option<String>,
    pub config: Option<PathBuf>,
    pub reconcile: bool,
    pub reconnect: bool,
    pub mock: bool,
}

/// Run the chat command.
pub async fn run(options: ChatOptions) -> Result<()> {
    let config = build_config(&options)?;

    let mut identity = Identity::new(options.username);
    if let Some(avatar) = options.avatar {
        identity = identity.with_avatar(avatar);
    }

    // Create transport and client based on mode
    if options.mock {
        session(ChatClient::new(config, MockTransport::echoing()), identity).await
    } else {
        session(ChatClient::new(config, WebSocketTransport::new()), identity).await
    }
}

/// Load the config file (if any), then apply command-line overrides.
fn build_config(options: &ChatOptions) -> Result<ClientConfig> {
    let mut config = match &options.config {
        Some(path) => ClientConfig::from_file(path).context("Failed to load config")?,
        None => ClientConfig::default(),
    };

    if let Some(endpoint) = &options.endpoint {
        config.endpoint = endpoint.clone();
    }
    if options.reconcile {
        config.echo_policy = EchoPolicy::Reconcile;
    }
    if options.reconnect {
        config.reconnect.enabled = true;
    }
    Ok(config)
}

async fn session<T: Transport + 'static>(
    mut client: ChatClient<T>,
    identity: Identity,
) -> Result<()> {
    let username = identity.username.clone();
    match client.activate(identity).await {
        Ok(()) => println!("Connected to {} as {}", client.config().endpoint, username),
        // Still logged in; the reconnect policy or /reconnect can recover
        Err(e @ ClientError::Connection(_)) => {
            eprintln!("Could not connect to {}: {}", client.config().endpoint, e)
        }
        Err(e) => return Err(e).context("Failed to log in"),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut updates_open = true;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                match line.trim() {
                    "" => {}
                    "/quit" => break,
                    "/reconnect" => {
                        match client.reconnect().await {
                            Ok(()) => println!("Reconnected (conversation cleared)"),
                            Err(e) => eprintln!("Reconnect failed: {}", e),
                        }
                        updates_open = true;
                    }
                    body => {
                        let result = client.compose_and_send(body);
                        if let Some(message) = client.conversation().last() {
                            println!("{}", render(message));
                        }
                        if let Err(e) = result {
                            eprintln!("Not sent: {}", e);
                        }
                    }
                }
            }
            update = client.next_update(), if updates_open => {
                match update {
                    Some(update) => report(&client, update),
                    None => updates_open = false,
                }
            }
        }
    }

    client.deactivate().await;
    println!("Logged out");
    Ok(())
}

fn report<T: Transport + 'static>(client: &ChatClient<T>, update: ClientUpdate) {
    match update {
        ClientUpdate::Appended { index } | ClientUpdate::Confirmed { index } => {
            if let Some(message) = client.conversation().get(index) {
                println!("{}", render(message));
            }
        }
        ClientUpdate::SendFailed { error } => eprintln!("Send failed: {}", error),
        ClientUpdate::ConnectionLost { error } => eprintln!("Connection lost: {}", error),
        ClientUpdate::Reconnecting { attempt, delay } => {
            eprintln!("Reconnecting in {:.1}s (attempt {})", delay.as_secs_f64(), attempt)
        }
        ClientUpdate::Reconnected => println!("Reconnected (conversation cleared)"),
        ClientUpdate::GaveUp { attempts, error } => eprintln!(
            "Disconnected after {} reconnect attempts: {} (type /reconnect to retry)",
            attempts, error
        ),
    }
}

fn render(message: &Message) -> String {
    let marker = match message.status {
        MessageStatus::Pending => "pending",
        MessageStatus::Confirmed => "confirmed",
    };
    match &message.avatar_ref {
        Some(avatar) => format!("[{}] {} ({}): {}", marker, message.author, avatar, message.body),
        None => format!("[{}] {}: {}", marker, message.author, message.body),
    }
}
