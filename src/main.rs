//! mongo-batch-export
//!
//! Exports a MongoDB collection into numbered JSON batch files, resuming
//! from the last checkpointed `_id` after an interruption.
//!
//! # Usage
//!
//! ```bash
//! mongo-batch-export mongodb://localhost:27017 -d shop -C orders --lanes 4
//! ```

use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mongo_batch_export::cli::CliInterface;
use mongo_batch_export::config::{Config, LoggingConfig};
use mongo_batch_export::connection::ConnectionManager;
use mongo_batch_export::error::{ConfigError, Result};
use mongo_batch_export::export::{
    ExportCoordinator, ExportOptions, JsonBatchWriter, LaneState, MongoPageFetcher,
    ProgressTracker,
};

/// Application entry point
#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments and load configuration
/// 2. Initialize logging
/// 3. Handle subcommands or run the export
///
/// # Returns
/// * `Result<bool>` - Whether every lane finished without failing
async fn run() -> Result<bool> {
    let mut cli = CliInterface::new()?;
    initialize_logging(&cli.config().logging)?;

    if cli.handle_subcommand()? {
        return Ok(true);
    }

    cli.prompt_missing()?;
    info!(uri = %cli.sanitized_uri(), "Connecting to MongoDB");
    run_export(cli.config()).await
}

/// Connect, export and disconnect
async fn run_export(config: &Config) -> Result<bool> {
    let required = |value: &Option<String>, field: &str| {
        value
            .clone()
            .ok_or_else(|| ConfigError::MissingField(field.to_string()))
    };
    let uri = required(&config.connection.uri, "connection.uri")?;
    let database = required(&config.connection.database, "connection.database")?;
    let collection = required(&config.connection.collection, "connection.collection")?;

    let mut manager = ConnectionManager::new(uri, config.connection.clone());
    manager.connect().await?;

    tokio::fs::create_dir_all(&config.export.export_dir).await?;

    let fetcher = MongoPageFetcher::new(manager.get_collection(&database, &collection)?);
    let total = if config.export.progress {
        fetcher.estimated_count().await.ok()
    } else {
        None
    };
    info!(
        database = %database,
        collection = %collection,
        estimated_records = total,
        export_dir = %config.export.export_dir.display(),
        "Export target ready"
    );

    let tracker = Arc::new(ProgressTracker::new(total, config.export.progress));
    let cancel_token = CancellationToken::new();
    let ctrl_c_handle = spawn_ctrl_c_handler(cancel_token.clone());

    let outcome = ExportCoordinator::new(
        Arc::new(fetcher),
        Arc::new(JsonBatchWriter::new(config.export.pretty)),
        ExportOptions::from(&config.export),
    )
    .with_progress(tracker)
    .with_cancellation(cancel_token)
    .execute()
    .await;

    ctrl_c_handle.abort();
    manager.disconnect().await;
    let summary = outcome?;

    if summary
        .lanes
        .iter()
        .any(|lane| lane.state == LaneState::Cancelled)
    {
        warn!("Export interrupted, run again to resume from the saved checkpoints");
    }
    info!(
        run_id = %summary.run_id,
        records = summary.total_records(),
        batches = summary.total_batches(),
        elapsed = ?summary.elapsed,
        "Total time taken"
    );

    Ok(summary.is_success())
}

/// Cancel `token` on Ctrl+C
fn spawn_ctrl_c_handler(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, stopping lanes after their current batch");
                token.cancel();
            }
            Err(err) => {
                eprintln!("Failed to listen for Ctrl+C: {}", err);
            }
        }
    })
}

/// Initialize logging from the effective logging configuration
///
/// `RUST_LOG` takes precedence over the configured level when set. With a
/// log file configured, output is appended to it without ANSI colors.
fn initialize_logging(config: &LoggingConfig) -> Result<()> {
    let level = config.level.to_tracing_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match &config.file_path {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let subscriber = subscriber.with_writer(Mutex::new(file)).with_ansi(false);
            if config.timestamps {
                subscriber.init();
            } else {
                subscriber.without_time().init();
            }
        }
        None => {
            let subscriber = subscriber.with_writer(std::io::stderr);
            if config.timestamps {
                subscriber.init();
            } else {
                subscriber.without_time().init();
            }
        }
    }

    Ok(())
}
