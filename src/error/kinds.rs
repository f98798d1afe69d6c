use std::{fmt, io};

use crate::error::mongo::format_mongodb_error;

/// Crate-wide `Result` type using [`ExportError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Top-level error type for export operations.
///
/// This type wraps more specific error kinds and provides a single
/// error type that can be used throughout the crate.
#[derive(Debug)]
pub enum ExportError {
    /// Connection-related errors.
    Connection(ConnectionError),

    /// Configuration errors.
    Config(ConfigError),

    /// Page fetch errors.
    Fetch(FetchError),

    /// Batch file write errors.
    Write(WriteError),

    /// Checkpoint persistence errors.
    Checkpoint(CheckpointError),

    /// I/O errors.
    Io(io::Error),

    /// MongoDB driver errors.
    MongoDb(mongodb::error::Error),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Connection-specific errors.
#[derive(Debug)]
pub enum ConnectionError {
    /// Failed to establish a connection.
    ConnectionFailed(String),

    /// Invalid connection URI.
    InvalidUri(String),

    /// Not currently connected to MongoDB.
    NotConnected,

    /// Ping command failed.
    PingFailed(String),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Missing required field.
    MissingField(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },

    /// Catch-all for other configuration problems.
    Generic(String),
}

/// Errors raised while fetching a page from the store.
#[derive(Debug)]
pub enum FetchError {
    /// The query itself failed (transport, auth, server error).
    QueryFailed(String),

    /// A returned record could not be decoded.
    DecodeFailed(String),

    /// A record has no usable `_id`.
    MissingKey { position: usize },

    /// Keys in a page were not strictly ascending past the request cursor.
    OutOfOrder { position: usize, key: String },

    /// Sampling the key space for partitioning failed.
    SamplingFailed(String),
}

/// Errors raised while writing a batch file.
#[derive(Debug)]
pub enum WriteError {
    /// Output file could not be created.
    CreateFailed { path: String, reason: String },

    /// Records could not be serialized.
    SerializeFailed(String),

    /// Output could not be flushed, synced or moved into place.
    PersistFailed { path: String, reason: String },
}

/// Errors raised while persisting checkpoint or partition state.
#[derive(Debug)]
pub enum CheckpointError {
    /// Checkpoint file could not be written.
    SaveFailed { path: String, reason: String },

    /// Partition plan could not be serialized or parsed.
    InvalidPlan(String),
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Connection(e) => write!(f, "Connection error: {e}"),
            ExportError::Config(e) => write!(f, "Configuration error: {e}"),
            ExportError::Fetch(e) => write!(f, "Fetch error: {e}"),
            ExportError::Write(e) => write!(f, "Write error: {e}"),
            ExportError::Checkpoint(e) => write!(f, "Checkpoint error: {e}"),
            ExportError::Io(e) => write!(f, "I/O error: {e}"),
            ExportError::MongoDb(e) => format_mongodb_error(f, e),
            ExportError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::ConnectionFailed(msg) => write!(f, "Failed to connect: {msg}"),
            ConnectionError::InvalidUri(uri) => write!(f, "Invalid connection URI: {uri}"),
            ConnectionError::NotConnected => write!(f, "Not connected to MongoDB"),
            ConnectionError::PingFailed(msg) => write!(f, "Ping failed: {msg}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not readable: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::MissingField(field) => write!(f, "Missing required field: {field}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
            ConfigError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::QueryFailed(msg) => write!(f, "Query failed: {msg}"),
            FetchError::DecodeFailed(msg) => write!(f, "Failed to decode batch: {msg}"),
            FetchError::MissingKey { position } => {
                write!(f, "Record at position {position} has no ObjectId _id")
            }
            FetchError::OutOfOrder { position, key } => {
                write!(f, "Record at position {position} with _id {key} is out of order")
            }
            FetchError::SamplingFailed(msg) => write!(f, "Key sampling failed: {msg}"),
        }
    }
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::CreateFailed { path, reason } => {
                write!(f, "Failed to create file {path}: {reason}")
            }
            WriteError::SerializeFailed(msg) => write!(f, "Failed to write JSON: {msg}"),
            WriteError::PersistFailed { path, reason } => {
                write!(f, "Failed to persist {path}: {reason}")
            }
        }
    }
}

impl fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointError::SaveFailed { path, reason } => {
                write!(f, "Failed to save checkpoint {path}: {reason}")
            }
            CheckpointError::InvalidPlan(msg) => write!(f, "Invalid partition plan: {msg}"),
        }
    }
}

impl std::error::Error for ExportError {}
impl std::error::Error for ConnectionError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for FetchError {}
impl std::error::Error for WriteError {}
impl std::error::Error for CheckpointError {}

/* ========================= Conversions to ExportError ========================= */

impl From<io::Error> for ExportError {
    fn from(err: io::Error) -> Self {
        ExportError::Io(err)
    }
}

impl From<mongodb::error::Error> for ExportError {
    fn from(err: mongodb::error::Error) -> Self {
        ExportError::MongoDb(err)
    }
}

impl From<ConnectionError> for ExportError {
    fn from(err: ConnectionError) -> Self {
        ExportError::Connection(err)
    }
}

impl From<ConfigError> for ExportError {
    fn from(err: ConfigError) -> Self {
        ExportError::Config(err)
    }
}

impl From<FetchError> for ExportError {
    fn from(err: FetchError) -> Self {
        ExportError::Fetch(err)
    }
}

impl From<WriteError> for ExportError {
    fn from(err: WriteError) -> Self {
        ExportError::Write(err)
    }
}

impl From<CheckpointError> for ExportError {
    fn from(err: CheckpointError) -> Self {
        ExportError::Checkpoint(err)
    }
}

impl From<String> for ExportError {
    fn from(msg: String) -> Self {
        ExportError::Generic(msg)
    }
}

impl From<&str> for ExportError {
    fn from(msg: &str) -> Self {
        ExportError::Generic(msg.to_owned())
    }
}
