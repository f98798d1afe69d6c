//! Export coordinator
//!
//! Resolves the lane ranges, starts one tokio task per lane, waits for all
//! of them and folds their reports into an [`ExportSummary`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use super::checkpoint::FileCheckpointStore;
use super::fetcher::PageFetcher;
use super::lane::{Lane, LaneReport};
use super::partition::resolve_ranges;
use super::progress::ProgressTracker;
use super::writer::BatchWriter;
use crate::config::{DEFAULT_BATCH_SIZE, ExportConfig};
use crate::error::Result;

/// Operator options for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    pub batch_size: u32,
    pub lane_count: usize,
    pub export_dir: PathBuf,
    pub checkpoint_path: PathBuf,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            lane_count: 1,
            export_dir: PathBuf::from("exports"),
            checkpoint_path: PathBuf::from("last_id.txt"),
        }
    }
}

impl From<&ExportConfig> for ExportOptions {
    fn from(config: &ExportConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            lane_count: config.lane_count,
            export_dir: config.export_dir.clone(),
            checkpoint_path: config.checkpoint_path.clone(),
        }
    }
}

/// Result of an export run
#[derive(Debug)]
pub struct ExportSummary {
    /// Identifier attached to every log line of the run
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// One report per lane, ordered by lane index
    pub lanes: Vec<LaneReport>,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

impl ExportSummary {
    /// True when no lane failed
    pub fn is_success(&self) -> bool {
        !self.lanes.iter().any(LaneReport::is_failed)
    }

    pub fn total_records(&self) -> u64 {
        self.lanes.iter().map(|l| l.records_exported).sum()
    }

    pub fn total_batches(&self) -> u64 {
        self.lanes.iter().map(|l| l.batches_written).sum()
    }

    pub fn failed_lanes(&self) -> Vec<usize> {
        self.lanes
            .iter()
            .filter(|l| l.is_failed())
            .map(|l| l.lane)
            .collect()
    }
}

/// Coordinator for resumable batch exports
pub struct ExportCoordinator {
    fetcher: Arc<dyn PageFetcher>,
    writer: Arc<dyn BatchWriter>,
    options: ExportOptions,
    tracker: Arc<ProgressTracker>,
    cancel_token: Option<CancellationToken>,
}

impl ExportCoordinator {
    /// Create a new export coordinator
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        writer: Arc<dyn BatchWriter>,
        options: ExportOptions,
    ) -> Self {
        Self {
            fetcher,
            writer,
            options,
            tracker: Arc::new(ProgressTracker::disabled()),
            cancel_token: None,
        }
    }

    /// Share a progress tracker with every lane
    pub fn with_progress(mut self, tracker: Arc<ProgressTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    /// Set cancellation token for this export operation
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Execute the export
    ///
    /// Errors returned here happen before any lane starts (range
    /// resolution). Lane failures are reported in the summary instead.
    pub async fn execute(&self) -> Result<ExportSummary> {
        let run_id = Uuid::new_v4();
        let span = info_span!("export", run_id = %run_id);
        self.run(run_id).instrument(span).await
    }

    async fn run(&self, run_id: Uuid) -> Result<ExportSummary> {
        let started_at = Utc::now();
        let start_time = Instant::now();
        let lane_count = self.options.lane_count.max(1);

        let ranges = resolve_ranges(
            self.fetcher.as_ref(),
            lane_count,
            &self.options.checkpoint_path,
        )
        .await?;

        info!(
            lanes = ranges.len(),
            batch_size = self.options.batch_size,
            export_dir = %self.options.export_dir.display(),
            "Starting export"
        );

        let mut handles = Vec::with_capacity(ranges.len());
        for (id, range) in ranges.iter().enumerate() {
            let checkpoint =
                FileCheckpointStore::for_lane(&self.options.checkpoint_path, id, lane_count);
            let mut lane = Lane::new(
                id,
                *range,
                self.fetcher.clone(),
                self.writer.clone(),
                Box::new(checkpoint),
            )
            .with_batch_size(self.options.batch_size)
            .with_export_dir(&self.options.export_dir)
            .with_progress(self.tracker.clone());
            if let Some(token) = &self.cancel_token {
                lane = lane.with_cancellation(token.clone());
            }

            let span = info_span!("lane", lane = id);
            handles.push(tokio::spawn(lane.run().instrument(span)));
        }

        let mut lanes = Vec::with_capacity(handles.len());
        for (id, handle) in handles.into_iter().enumerate() {
            let report = match handle.await {
                Ok(report) => report,
                Err(e) => {
                    error!(lane = id, error = %e, "Lane task aborted");
                    LaneReport::aborted(id, ranges[id], e.to_string())
                }
            };
            lanes.push(report);
        }

        self.tracker.finish();

        let summary = ExportSummary {
            run_id,
            started_at,
            lanes,
            elapsed: start_time.elapsed(),
        };

        for report in &summary.lanes {
            info!(
                lane = report.lane,
                state = %report.state,
                batches = report.batches_written,
                records = report.records_exported,
                cursor = %report.last_cursor,
                "Lane finished"
            );
        }

        if summary.is_success() {
            info!(
                records = summary.total_records(),
                batches = summary.total_batches(),
                elapsed_ms = summary.elapsed.as_millis() as u64,
                "Export completed"
            );
        } else {
            warn!(
                failed_lanes = ?summary.failed_lanes(),
                records = summary.total_records(),
                elapsed_ms = summary.elapsed.as_millis() as u64,
                "Export finished with failures"
            );
        }

        Ok(summary)
    }
}
