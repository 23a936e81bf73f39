//! # Configuration Management
//!
//! Structured configuration for the sealed datagram relay.
//!
//! A relay has one pre-shared key, one or more UDP listeners, and logging
//! settings. Each listener decides what happens to authenticated plaintext:
//! echo it back sealed, forward it to a destination, or discard it.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Environment overrides via `from_env()` / `apply_env_overrides()`
//! - Direct instantiation with defaults
//!
//! ## Example
//! ```toml
//! [server]
//! chacha_key = "d38a3b96a26d0b1139bd30c174884f5dbc8eaaf492493725633ecebfa4ab19e9"
//!
//! [[listeners]]
//! bind = "0.0.0.0:5171"
//! action = { type = "forward", address = "127.0.0.1:6000" }
//!
//! [[listeners]]
//! bind = "0.0.0.0:5172"
//! action = { type = "echo" }
//! ```
//!
//! ## Security Considerations
//! - The key is validated at load time; a malformed key is fatal
//! - `Debug` output of [`ServerConfig`] never shows the key

use crate::core::frame::{MAX_DATAGRAM_LEN, MIN_FRAME_LEN};
use crate::error::{ProtocolError, Result};
use crate::utils::crypto::{SymmetricKey, KEY_LEN};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Default UDP port used by the reference clients
pub const DEFAULT_PORT: u16 = 5171;

/// Default maximum number of datagrams processed at once
pub const DEFAULT_MAX_IN_FLIGHT: usize = 1024;

/// Environment variable holding the hex-encoded key
pub const ENV_KEY: &str = "SECURE_DATAGRAM_KEY";

/// Environment variable replacing the first listener's bind address
pub const ENV_BIND: &str = "SECURE_DATAGRAM_BIND";

/// Environment variable turning the first listener into a forwarder
pub const ENV_FORWARD: &str = "SECURE_DATAGRAM_FORWARD";

/// Environment variable overriding the log level
pub const ENV_LOG_LEVEL: &str = "SECURE_DATAGRAM_LOG_LEVEL";

/// Main relay configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
    /// Key and datagram limits shared by every listener
    #[serde(default)]
    pub server: ServerConfig,

    /// One entry per bound UDP socket
    #[serde(default = "default_listeners")]
    pub listeners: Vec<ListenerConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            listeners: default_listeners(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_listeners() -> Vec<ListenerConfig> {
    vec![ListenerConfig::default()]
}

impl RelayConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Overlay environment variables on an existing configuration
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(key) = std::env::var(ENV_KEY) {
            self.server.chacha_key = key;
        }

        if let Ok(bind) = std::env::var(ENV_BIND) {
            self.first_listener().bind = bind;
        }

        if let Ok(address) = std::env::var(ENV_FORWARD) {
            self.first_listener().action = ListenerAction::Forward { address };
        }

        if let Ok(level) = std::env::var(ENV_LOG_LEVEL) {
            self.logging.log_level = level.parse::<Level>().map_err(|_| {
                ProtocolError::ConfigError(format!("Invalid log level in {ENV_LOG_LEVEL}: {level}"))
            })?;
        }

        Ok(())
    }

    fn first_listener(&mut self) -> &mut ListenerConfig {
        if self.listeners.is_empty() {
            self.listeners.push(ListenerConfig::default());
        }
        &mut self.listeners[0]
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        errors.extend(self.server.validate());

        if self.listeners.is_empty() {
            errors.push("At least one listener must be configured".to_string());
        }

        let mut seen = HashSet::new();
        for (index, listener) in self.listeners.iter().enumerate() {
            errors.extend(
                listener
                    .validate()
                    .into_iter()
                    .map(|e| format!("listener[{index}]: {e}")),
            );
            let ephemeral = listener
                .bind
                .parse::<SocketAddr>()
                .is_ok_and(|addr| addr.port() == 0);
            if !ephemeral && !seen.insert(listener.bind.as_str()) {
                errors.push(format!(
                    "listener[{index}]: Duplicate bind address '{}'",
                    listener.bind
                ));
            }
        }

        errors.extend(self.logging.validate());

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Key material and per-datagram limits
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Pre-shared ChaCha20-Poly1305 key, 64 hex characters
    pub chacha_key: String,

    /// Receive buffer size; larger datagrams are truncated by the OS
    pub max_datagram_size: usize,

    /// Maximum number of datagrams processed concurrently per listener
    pub max_in_flight: usize,

    /// Time to wait for in-flight datagrams on shutdown
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            chacha_key: String::new(),
            max_datagram_size: MAX_DATAGRAM_LEN,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            shutdown_timeout: timeout::SHUTDOWN_TIMEOUT,
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("chacha_key", &"<redacted>")
            .field("max_datagram_size", &self.max_datagram_size)
            .field("max_in_flight", &self.max_in_flight)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish()
    }
}

impl ServerConfig {
    /// Decode the configured key. A bad key is a startup error.
    pub fn symmetric_key(&self) -> Result<SymmetricKey> {
        SymmetricKey::from_hex(&self.chacha_key)
    }

    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let key = self.chacha_key.trim();
        if key.is_empty() {
            errors.push(format!(
                "chacha_key must be set (or provided via {ENV_KEY})"
            ));
        } else if key.len() != KEY_LEN * 2 {
            errors.push(format!(
                "Invalid chacha_key: expected {} hex characters, got {}",
                KEY_LEN * 2,
                key.len()
            ));
        } else if !key.chars().all(|c| c.is_ascii_hexdigit()) {
            errors.push("Invalid chacha_key: contains non-hex characters".to_string());
        }

        if self.max_datagram_size < MIN_FRAME_LEN {
            errors.push(format!(
                "Max datagram size too small: {} (minimum: {MIN_FRAME_LEN})",
                self.max_datagram_size
            ));
        } else if self.max_datagram_size > MAX_DATAGRAM_LEN {
            errors.push(format!(
                "Max datagram size too large: {} (maximum: {MAX_DATAGRAM_LEN})",
                self.max_datagram_size
            ));
        }

        if self.max_in_flight == 0 {
            errors.push("Max in-flight datagrams must be greater than 0".to_string());
        } else if self.max_in_flight > 1_000_000 {
            errors.push(format!(
                "Max in-flight datagrams too large: {} (max recommended: 1,000,000)",
                self.max_in_flight
            ));
        }

        if self.shutdown_timeout.as_secs() < 1 {
            errors.push("Shutdown timeout too short (minimum: 1s)".to_string());
        } else if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        errors
    }
}

/// One UDP listener
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ListenerConfig {
    /// Local address to bind (e.g., "0.0.0.0:5171")
    pub bind: String,

    /// What to do with authenticated plaintext
    #[serde(default)]
    pub action: ListenerAction,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind: format!("0.0.0.0:{DEFAULT_PORT}"),
            action: ListenerAction::default(),
        }
    }
}

impl ListenerConfig {
    /// Validate listener configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.bind.is_empty() {
            errors.push("Bind address cannot be empty".to_string());
        } else if self.bind.parse::<SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid bind address format: '{}' (expected format: '0.0.0.0:5171')",
                self.bind
            ));
        }

        if let ListenerAction::Forward { address } = &self.action {
            match split_host_port(address) {
                None => errors.push(format!(
                    "Invalid forward address format: '{address}' (expected format: 'host:6000')"
                )),
                Some((_, 0)) => errors.push("Forward destination port cannot be 0".to_string()),
                Some(_) => {}
            }
        }

        errors
    }
}

/// Split `host:port` (or `[v6]:port`). Host names are resolved later, at bind.
fn split_host_port(address: &str) -> Option<(&str, u16)> {
    let (host, port) = address.rsplit_once(':')?;
    let port = port.parse::<u16>().ok()?;
    let host = match host.strip_prefix('[') {
        Some(v6) => v6.strip_suffix(']')?,
        None if host.contains(':') => return None,
        None => host,
    };
    if host.is_empty() || host.chars().any(char::is_whitespace) {
        return None;
    }
    Some((host, port))
}

/// Processing applied to authenticated plaintext
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ListenerAction {
    /// Seal the plaintext again and send it back to the peer
    #[default]
    Echo,
    /// Send the plaintext to `address` (`host:port`) as one UDP datagram, no reply
    Forward { address: String },
    /// Accept and drop, no reply
    Discard,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,

    /// Whether decrypted message text is logged (at trace level)
    #[serde(default)]
    pub log_plaintext: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("secure-datagram"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
            log_plaintext: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).map_err(serde::ser::Error::custom)?;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
