//! # Configuration Management
//!
//! Centralized configuration for the wire codec.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides via `from_env()`
//!
//! ## Security Considerations
//! - `max_depth` bounds recursion on attacker-supplied nesting
//! - `max_string_len` / `max_collection_len` bound the size any single
//!   length prefix may claim, independently of the buffer size

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::Level;

/// Default maximum nesting of records (embedded, recursive, variant, elements)
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Hard upper bound accepted for `max_depth`
pub const MAX_DEPTH_LIMIT: usize = 1024;

/// Default maximum string length in bytes
pub const DEFAULT_MAX_STRING_LEN: usize = 4_096_000;

/// Default maximum element count of a collection or map
pub const DEFAULT_MAX_COLLECTION_LEN: usize = 4_096_000;

/// Largest length or count the wire format can carry
pub const WIRE_LENGTH_CAPACITY: usize = i32::MAX as usize;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProtocolConfig {
    /// Codec limits
    #[serde(default)]
    pub codec: CodecConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ProtocolConfig {
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

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(depth) = std::env::var("GAME_PROTOCOL_MAX_DEPTH") {
            config.codec.max_depth = depth.parse::<usize>().map_err(|e| {
                ProtocolError::ConfigError(format!("Invalid GAME_PROTOCOL_MAX_DEPTH: {e}"))
            })?;
        }

        if let Ok(len) = std::env::var("GAME_PROTOCOL_MAX_STRING_LEN") {
            config.codec.max_string_len = len.parse::<usize>().map_err(|e| {
                ProtocolError::ConfigError(format!("Invalid GAME_PROTOCOL_MAX_STRING_LEN: {e}"))
            })?;
        }

        if let Ok(len) = std::env::var("GAME_PROTOCOL_MAX_COLLECTION_LEN") {
            config.codec.max_collection_len = len.parse::<usize>().map_err(|e| {
                ProtocolError::ConfigError(format!(
                    "Invalid GAME_PROTOCOL_MAX_COLLECTION_LEN: {e}"
                ))
            })?;
        }

        if let Ok(level) = std::env::var("GAME_PROTOCOL_LOG_LEVEL") {
            config.logging.log_level = level.parse::<Level>().map_err(|_| {
                ProtocolError::ConfigError(format!("Invalid GAME_PROTOCOL_LOG_LEVEL: {level}"))
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
        errors.extend(self.codec.validate());
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

/// Limits applied by every codec operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Maximum record nesting depth
    pub max_depth: usize,

    /// Maximum string length in bytes
    pub max_string_len: usize,

    /// Maximum number of elements in a collection or entries in a map
    pub max_collection_len: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_string_len: DEFAULT_MAX_STRING_LEN,
            max_collection_len: DEFAULT_MAX_COLLECTION_LEN,
        }
    }
}

impl CodecConfig {
    /// Same limits with a different depth bound
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Depth bound actually enforced; never above [`MAX_DEPTH_LIMIT`]
    pub fn depth_limit(&self) -> usize {
        self.max_depth.min(MAX_DEPTH_LIMIT)
    }

    /// Same limits pulled into the range the wire format and the stack can carry
    pub fn clamped(self) -> Self {
        Self {
            max_depth: self.depth_limit(),
            max_string_len: self.max_string_len.min(WIRE_LENGTH_CAPACITY),
            max_collection_len: self.max_collection_len.min(WIRE_LENGTH_CAPACITY),
        }
    }

    /// Validate codec configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_depth == 0 {
            errors.push("Max depth must be greater than 0".to_string());
        } else if self.max_depth > MAX_DEPTH_LIMIT {
            errors.push(format!(
                "Max depth too large: {} (maximum: {MAX_DEPTH_LIMIT})",
                self.max_depth
            ));
        }

        if self.max_string_len == 0 {
            errors.push("Max string length must be greater than 0".to_string());
        } else if self.max_string_len > WIRE_LENGTH_CAPACITY {
            errors.push(format!(
                "Max string length {} exceeds wire capacity ({WIRE_LENGTH_CAPACITY})",
                self.max_string_len
            ));
        }

        if self.max_collection_len == 0 {
            errors.push("Max collection length must be greater than 0".to_string());
        } else if self.max_collection_len > WIRE_LENGTH_CAPACITY {
            errors.push(format!(
                "Max collection length {} exceeds wire capacity ({WIRE_LENGTH_CAPACITY})",
                self.max_collection_len
            ));
        }

        errors
    }
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

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("game-wire-protocol"),
            log_level: Level::INFO,
            log_to_console: true,
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

        if self.json_format && !self.log_to_console {
            errors.push("json_format has no effect when log_to_console is false".to_string());
        }

        errors
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
