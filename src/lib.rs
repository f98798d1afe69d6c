//! Resumable batch export for MongoDB collections
//!
//! This library reads a collection in ascending `_id` order, writes one JSON
//! array file per page and checkpoints the last exported `_id`, so an
//! interrupted export continues where it stopped.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Configuration management
//! - `connection`: MongoDB connection management
//! - `error`: Error types and handling
//! - `export`: Export engine (cursor, pages, checkpoints, lanes, coordinator)
//! - `formatter`: BSON to JSON conversion for batch files
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use mongo_batch_export::{config::Config, connection::ConnectionManager};
//! use mongo_batch_export::export::{
//!     ExportCoordinator, ExportOptions, JsonBatchWriter, MongoPageFetcher,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let mut manager = ConnectionManager::new(
//!         "mongodb://localhost:27017".to_string(),
//!         config.connection.clone(),
//!     );
//!     manager.connect().await?;
//!
//!     let fetcher = MongoPageFetcher::new(manager.get_collection("shop", "orders")?);
//!     let summary = ExportCoordinator::new(
//!         Arc::new(fetcher),
//!         Arc::new(JsonBatchWriter::new(true)),
//!         ExportOptions::from(&config.export),
//!     )
//!     .execute()
//!     .await?;
//!     println!("{} records exported", summary.total_records());
//!
//!     manager.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod export;
pub mod formatter;

// Re-export commonly used types
pub use config::Config;
pub use connection::ConnectionManager;
pub use error::{ExportError, Result};
pub use export::{ExportCoordinator, ExportOptions, ExportSummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
