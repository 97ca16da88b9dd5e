//! Configuration for chatsync clients.
//!
//! Configuration can be built in code or loaded from a TOML file:
//!
//! ```toml
//! endpoint = "ws://localhost:5000"
//! echo_policy = "reconcile"
//!
//! [reconnect]
//! enabled = true
//! base_delay_ms = 2000
//! max_delay_ms = 30000
//! max_jitter_ms = 5000
//! max_attempts = 10
//! ```
//!
//! Every field is optional.

use chat_core::{EchoPolicy, ReconnectPolicy};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for [`ChatClient`](crate::ChatClient).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    /// Chat server address (default: ws://localhost:5000).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Treatment of the sender's own broadcast echo (default: duplicate).
    #[serde(default)]
    pub echo_policy: EchoPolicy,
    /// Automatic reconnect settings.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

/// Automatic reconnect settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReconnectConfig {
    /// Reconnect after a lost connection (default: false).
    #[serde(default)]
    pub enabled: bool,
    /// Delay before the first attempt in milliseconds (default: 2000).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Cap on the backoff delay in milliseconds (default: 30000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Upper bound on random jitter in milliseconds (default: 5000).
    #[serde(default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,
    /// Give up after this many attempts (default: unlimited).
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

fn default_endpoint() -> String {
    "ws://localhost:5000".to_string()
}

fn default_base_delay_ms() -> u64 {
    2_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_max_jitter_ms() -> u64 {
    5_000
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_jitter_ms: default_max_jitter_ms(),
            max_attempts: None,
        }
    }
}

impl ReconnectConfig {
    /// Build the reconnect policy these settings describe.
    pub fn to_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            enabled: self.enabled,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            max_jitter: Duration::from_millis(self.max_jitter_ms),
            max_attempts: self.max_attempts,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            echo_policy: EchoPolicy::default(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Create a configuration for the given endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Set the echo policy.
    pub fn with_echo_policy(mut self, echo_policy: EchoPolicy) -> Self {
        self.echo_policy = echo_policy;
        self
    }

    /// Turn automatic reconnect on or off.
    pub fn with_reconnect(mut self, enabled: bool) -> Self {
        self.reconnect.enabled = enabled;
        self
    }

    /// Set the full reconnect settings.
    pub fn with_reconnect_config(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// The reconnect policy for this configuration.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        self.reconnect.to_policy()
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_matches_chat_server() {
        let config = ClientConfig::default();
        assert_eq!(config.endpoint, "ws://localhost:5000");
        assert_eq!(config.echo_policy, EchoPolicy::Duplicate);
        assert!(!config.reconnect.enabled);
        assert!(!config.reconnect_policy().enabled);
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            endpoint = "ws://chat.local:9000"
            echo_policy = "reconcile"

            [reconnect]
            enabled = true
            base_delay_ms = 500
            max_delay_ms = 8000
            max_jitter_ms = 0
            max_attempts = 3
        "#;

        let config: ClientConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.endpoint, "ws://chat.local:9000");
        assert_eq!(config.echo_policy, EchoPolicy::Reconcile);

        let policy = config.reconnect_policy();
        assert!(policy.enabled);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Duration::from_secs(8));
        assert_eq!(policy.max_jitter, Duration::ZERO);
        assert_eq!(policy.max_attempts, Some(3));
    }

    #[test]
    fn partial_reconnect_section_keeps_defaults() {
        let toml = r#"
            [reconnect]
            enabled = true
        "#;

        let config: ClientConfig = toml::from_str(toml).unwrap();
        assert!(config.reconnect.enabled);
        assert_eq!(config.reconnect.base_delay_ms, 2_000);
        assert_eq!(config.reconnect.max_delay_ms, 30_000);
        assert!(config.reconnect.max_attempts.is_none());
    }

    #[test]
    fn unknown_echo_policy_is_rejected() {
        let result: Result<ClientConfig, _> = toml::from_str(r#"echo_policy = "dedupe""#);
        assert!(result.is_err());
    }

    #[test]
    fn builder_pattern() {
        let config = ClientConfig::new("ws://127.0.0.1:5001")
            .with_echo_policy(EchoPolicy::Reconcile)
            .with_reconnect(true);

        assert_eq!(config.endpoint, "ws://127.0.0.1:5001");
        assert_eq!(config.echo_policy, EchoPolicy::Reconcile);
        assert!(config.reconnect_policy().enabled);
    }

    #[test]
    fn from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"endpoint = "ws://from-file:5000""#).unwrap();

        let config = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(config.endpoint, "ws://from-file:5000");
    }

    #[test]
    fn from_file_missing_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ClientConfig::from_file(&dir.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn from_file_invalid_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "endpoint = [").unwrap();

        let result = ClientConfig::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }
}
