//! # chatsync
//!
//! Terminal client and local relay for the chatsync real-time chat protocol.
//!
//! ## Commands
//!
//! - `chat`: Log in and chat from the terminal
//! - `serve`: Run a broadcast relay for local testing
//!
//! ## Example
//!
//! ```bash
//! # Start a relay
//! chatsync serve --bind 127.0.0.1:5000
//!
//! # In two other terminals
//! chatsync chat --username alice
//! chatsync chat --username bob --reconcile
//!
//! # Without a server: every message is echoed back locally
//! chatsync chat --username alice --mock
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{chat, serve};

/// Terminal client and local relay for chatsync.
#[derive(Parser, Debug)]
#[command(name = "chatsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Use an in-process echo transport instead of a real server (for testing/demo)
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and chat from the terminal
    Chat {
        /// Display name
        #[arg(long, short)]
        username: String,

        /// Avatar reference (URL or asset key)
        #[arg(long, short)]
        avatar: Option<String>,

        /// Chat server address (overrides the config file)
        #[arg(long, short)]
        endpoint: Option<String>,

        /// TOML configuration file
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Show your own messages once, confirmed in place by their echo
        #[arg(long)]
        reconcile: bool,

        /// Reconnect automatically with exponential backoff
        #[arg(long)]
        reconnect: bool,
    },

    /// Run a relay that broadcasts every chat frame to all connected clients
    Serve {
        /// Address to listen on
        #[arg(long, short, default_value = "127.0.0.1:5000")]
        bind: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so they never interleave with the conversation
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Chat {
            username,
            avatar,
            endpoint,
            config,
            reconcile,
            reconnect,
        } => {
            chat::run(chat::ChatOptions {
                username,
                avatar,
                endpoint,
                config,
                reconcile,
                reconnect,
                mock: cli.mock,
            })
            .await?;
        }
        Commands::Serve { bind } => {
            if cli.mock {
                anyhow::bail!("--mock has no effect on serve");
            }
            serve::run(&bind).await?;
        }
    }

    Ok(())
}
