//! # Configuration Management
//!
//! Centralized configuration for the RCON client core.
//!
//! This module provides structured configuration for the primary RCON session,
//! the Evrima dialect, and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - TOML strings via `from_toml()`
//! - Environment variables via `from_env()`
//! - Direct instantiation with defaults
//!
//! ## Security Considerations
//! - Passwords are wrapped in [`Credential`], whose `Debug` output is redacted
//! - Every blocking operation is bounded by a timeout; zero timeouts are rejected

use crate::error::{ProtocolError, Result};
use crate::protocol::encoding::CommandEncoding;
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Max accepted response frame body (16 MB)
pub const MAX_RESPONSE_SIZE: usize = 16 * 1024 * 1024;

/// Bytes read per Evrima response
pub const EVRIMA_READ_BUFFER_SIZE: usize = 1024;

/// Default RCON port (Source engine convention)
pub const DEFAULT_RCON_PORT: u16 = 27015;

/// Default Evrima RCON port
pub const DEFAULT_EVRIMA_PORT: u16 = 8888;

/// Host and port of a remote server
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Shared secret sent once during the handshake
#[derive(Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl From<&str> for Credential {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Credential {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Top-level configuration containing all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ClientConfig {
    /// Primary RCON session settings
    #[serde(default)]
    pub rcon: RconConfig,

    /// Evrima dialect settings
    #[serde(default)]
    pub evrima: EvrimaConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ClientConfig {
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

    /// Load configuration from environment variables on top of the defaults.
    ///
    /// Host, port, password and timeout apply to both dialects.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("GAMERCON_HOST") {
            config.rcon.host = host.clone();
            config.evrima.host = host;
        }

        if let Ok(port) = std::env::var("GAMERCON_PORT") {
            let port = port
                .parse::<u16>()
                .map_err(|e| ProtocolError::ConfigError(format!("Invalid GAMERCON_PORT: {e}")))?;
            config.rcon.port = port;
            config.evrima.port = port;
        }

        if let Ok(password) = std::env::var("GAMERCON_PASSWORD") {
            config.rcon.password = Credential::new(password.clone());
            config.evrima.password = Credential::new(password);
        }

        if let Ok(timeout) = std::env::var("GAMERCON_TIMEOUT_MS") {
            let millis = timeout.parse::<u64>().map_err(|e| {
                ProtocolError::ConfigError(format!("Invalid GAMERCON_TIMEOUT_MS: {e}"))
            })?;
            config.rcon.timeout = Duration::from_millis(millis);
            config.evrima.timeout = Duration::from_millis(millis);
        }

        if let Ok(level) = std::env::var("GAMERCON_LOG_LEVEL") {
            config.logging.log_level = level.parse::<Level>().map_err(|_| {
                ProtocolError::ConfigError(format!("Invalid GAMERCON_LOG_LEVEL: {level}"))
            })?;
        }

        Ok(config)
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
        errors.extend(self.rcon.validate());
        errors.extend(self.evrima.validate());
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

/// Primary RCON session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RconConfig {
    /// Server host name or IP address
    pub host: String,

    /// Server RCON port
    pub port: u16,

    /// RCON password
    pub password: Credential,

    /// Bound applied to connect and to every read and write
    #[serde(with = "duration_serde")]
    pub timeout: Duration,

    /// Largest response frame body accepted, in bytes
    #[serde(default = "default_max_response_size")]
    pub max_response_size: usize,

    /// Payload encoding applied by `execute`
    #[serde(default)]
    pub encoding: CommandEncoding,
}

fn default_max_response_size() -> usize {
    MAX_RESPONSE_SIZE
}

impl Default for RconConfig {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: DEFAULT_RCON_PORT,
            password: Credential::default(),
            timeout: timeout::DEFAULT_TIMEOUT,
            max_response_size: MAX_RESPONSE_SIZE,
            encoding: CommandEncoding::Plain,
        }
    }
}

impl RconConfig {
    pub fn new(host: impl Into<String>, port: u16, password: impl Into<Credential>) -> Self {
        Self {
            host: host.into(),
            port,
            password: password.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_encoding(mut self, encoding: CommandEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }

    /// Validate RCON configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.host.trim().is_empty() {
            errors.push("RCON host cannot be empty".to_string());
        }

        if self.port == 0 {
            errors.push("RCON port must be greater than 0".to_string());
        }

        if self.timeout.is_zero() {
            errors.push("RCON timeout must be greater than 0".to_string());
        } else if self.timeout.as_secs() > 300 {
            errors.push("RCON timeout too long (maximum: 300s)".to_string());
        }

        if self.max_response_size < 1024 {
            errors.push("Max response size too small (minimum: 1 KB)".to_string());
        } else if self.max_response_size > i32::MAX as usize {
            errors.push(format!(
                "Max response size too large: {} bytes (maximum: {})",
                self.max_response_size,
                i32::MAX
            ));
        }

        errors
    }
}

/// Evrima dialect configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EvrimaConfig {
    /// Server host name or IP address
    pub host: String,

    /// Server RCON port
    pub port: u16,

    /// RCON password
    pub password: Credential,

    /// Bound applied to connect and to every read and write
    #[serde(with = "duration_serde")]
    pub timeout: Duration,

    /// Maximum bytes read for a single response
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
}

fn default_read_buffer_size() -> usize {
    EVRIMA_READ_BUFFER_SIZE
}

impl Default for EvrimaConfig {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: DEFAULT_EVRIMA_PORT,
            password: Credential::default(),
            timeout: timeout::EVRIMA_TIMEOUT,
            read_buffer_size: EVRIMA_READ_BUFFER_SIZE,
        }
    }
}

impl EvrimaConfig {
    pub fn new(host: impl Into<String>, port: u16, password: impl Into<Credential>) -> Self {
        Self {
            host: host.into(),
            port,
            password: password.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }

    /// Validate Evrima configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.host.trim().is_empty() {
            errors.push("Evrima host cannot be empty".to_string());
        }

        if self.port == 0 {
            errors.push("Evrima port must be greater than 0".to_string());
        }

        if self.timeout.is_zero() {
            errors.push("Evrima timeout must be greater than 0".to_string());
        }

        if self.read_buffer_size == 0 {
            errors.push("Evrima read buffer size must be greater than 0".to_string());
        } else if self.read_buffer_size > 1024 * 1024 {
            errors.push("Evrima read buffer size too large (maximum: 1 MB)".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("gamercon"),
            log_level: Level::INFO,
            json_format: false,
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
        let millis = duration.as_millis() as u64;
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
