//! Configuration management for the exporter
//!
//! Configuration is assembled from:
//! - A TOML configuration file
//! - Command-line arguments
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Configuration file
//! 3. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Default number of records per batch file
pub const DEFAULT_BATCH_SIZE: u32 = 100_000;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection configuration
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Export engine configuration
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// MongoDB connection URI
    #[serde(default)]
    pub uri: Option<String>,

    /// Database holding the exported collection
    #[serde(default)]
    pub database: Option<String>,

    /// Collection to export
    #[serde(default)]
    pub collection: Option<String>,

    /// Connection and server selection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

/// Export engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Records per page and per batch file
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Number of parallel lanes over disjoint key ranges
    #[serde(default = "default_lane_count")]
    pub lane_count: usize,

    /// Directory receiving batch files
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,

    /// Checkpoint file location (per-lane files are derived from it)
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: PathBuf,

    /// Indent batch files (false writes compact JSON)
    #[serde(default = "default_pretty")]
    pub pretty: bool,

    /// Show a progress spinner while exporting
    #[serde(default = "default_progress")]
    pub progress: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Path to log file (None for stderr)
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_timeout() -> u64 {
    30
}

fn default_batch_size() -> u32 {
    DEFAULT_BATCH_SIZE
}

fn default_lane_count() -> usize {
    1
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("exports")
}

fn default_checkpoint_path() -> PathBuf {
    PathBuf::from("last_id.txt")
}

fn default_pretty() -> bool {
    true
}

fn default_progress() -> bool {
    true
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            uri: None,
            database: None,
            collection: None,
            timeout: default_timeout(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            lane_count: default_lane_count(),
            export_dir: default_export_dir(),
            checkpoint_path: default_checkpoint_path(),
            pretty: default_pretty(),
            progress: default_progress(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_path: None,
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// When `path` is `None` the default location is used, and a missing
    /// default file simply yields the default configuration. An explicitly
    /// requested file must exist.
    ///
    /// # Arguments
    /// * `path` - Optional explicit configuration file path
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_config_path(), false),
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigError::FileNotFound(path.display().to_string()).into());
            }
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| {
            ConfigError::FileNotFound(format!("{}: {}", path.display(), e))
        })?;

        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".mongo-batch-export")
            .join("config.toml")
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        if self.export.batch_size == 0 {
            return Err(invalid("export.batch_size", "0"));
        }
        if self.export.lane_count == 0 {
            return Err(invalid("export.lane_count", "0"));
        }
        if self.export.export_dir.as_os_str().is_empty() {
            return Err(invalid("export.export_dir", ""));
        }
        if self.export.checkpoint_path.as_os_str().is_empty() {
            return Err(invalid("export.checkpoint_path", ""));
        }
        if self.connection.timeout == 0 {
            return Err(invalid("connection.timeout", "0"));
        }
        if let Some(uri) = &self.connection.uri {
            if !uri.starts_with("mongodb://") && !uri.starts_with("mongodb+srv://") {
                return Err(invalid("connection.uri", &sanitize_uri(uri)));
            }
        }
        Ok(())
    }

}

impl ConnectionConfig {
    /// Connect and server selection timeout as a Duration
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// Hide the credentials part of a connection URI
pub fn sanitize_uri(uri: &str) -> String {
    if let Some(proto_end) = uri.find("://") {
        if let Some(host_start) = uri.rfind('@') {
            if host_start > proto_end {
                let proto = &uri[..proto_end + 3];
                let host = &uri[host_start..];
                return format!("{}***{}", proto, host);
            }
        }
    }
    uri.to_string()
}

fn invalid(field: &str, value: &str) -> crate::error::ExportError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}
