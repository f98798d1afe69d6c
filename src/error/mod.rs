//! Error handling for export operations.
//!
//! Errors follow the exporter's failure taxonomy:
//! - connection and configuration errors abort the run before any lane starts
//! - fetch and write errors fail the owning lane only
//! - checkpoint errors are reported to the lane, which logs them as warnings
//!
//! MongoDB driver errors are rendered as structured JSON so they can be
//! correlated with lane and cursor fields in the log.

pub mod kinds;
pub mod mongo;

pub use kinds::{
    CheckpointError, ConfigError, ConnectionError, ExportError, FetchError, Result, WriteError,
};
pub use mongo::ErrorInfo;
