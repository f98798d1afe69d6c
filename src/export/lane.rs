//! Lane execution
//!
//! A lane owns one key range, one checkpoint and one batch sequence. It runs
//! strictly sequentially:
//!
//! ```text
//! FETCH --empty--> DONE
//! FETCH --page--> WRITE --> CHECKPOINT --> FETCH
//! FETCH/WRITE --error--> FAILED
//! (cancel observed before FETCH) --> CANCELLED
//! ```
//!
//! Checkpoint failures are logged and the lane keeps going; the worst case
//! on restart is re-exporting the pages after the last durable checkpoint.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::checkpoint::CheckpointStore;
use super::cursor::{Cursor, KeyRange};
use super::fetcher::PageFetcher;
use super::page::Page;
use super::progress::ProgressTracker;
use super::writer::{BatchWriter, batch_file_name};
use crate::config::DEFAULT_BATCH_SIZE;

/// Position of a lane in its fetch/write/checkpoint cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneState {
    Fetch,
    Write,
    Checkpoint,
    Done,
    Failed,
    Cancelled,
}

impl LaneState {
    /// Whether the lane has stopped
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Write => "write",
            Self::Checkpoint => "checkpoint",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for LaneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single lane
#[derive(Debug, Clone)]
pub struct LaneReport {
    /// Lane index, also used in batch file names
    pub lane: usize,
    /// Key range the lane was responsible for
    pub range: KeyRange,
    /// Terminal state
    pub state: LaneState,
    /// Batch files successfully written in this run
    pub batches_written: u64,
    /// Records contained in those batch files
    pub records_exported: u64,
    /// Cursor the lane resumed from
    pub start_cursor: Cursor,
    /// Cursor after the last written page
    pub last_cursor: Cursor,
    /// Checkpoint saves that failed and were skipped
    pub checkpoint_failures: u64,
    /// Failure description for `Failed` lanes
    pub error: Option<String>,
}

impl LaneReport {
    fn new(lane: usize, range: KeyRange, start: Cursor) -> Self {
        Self {
            lane,
            range,
            state: LaneState::Fetch,
            batches_written: 0,
            records_exported: 0,
            start_cursor: start,
            last_cursor: start,
            checkpoint_failures: 0,
            error: None,
        }
    }

    /// Report for a lane whose task died before producing one
    pub fn aborted(lane: usize, range: KeyRange, reason: impl Into<String>) -> Self {
        let mut report = Self::new(lane, range, range.lower);
        report.state = LaneState::Failed;
        report.error = Some(reason.into());
        report
    }

    pub fn is_failed(&self) -> bool {
        self.state == LaneState::Failed
    }
}

/// One independent export worker over a key range
pub struct Lane {
    id: usize,
    range: KeyRange,
    fetcher: Arc<dyn PageFetcher>,
    writer: Arc<dyn BatchWriter>,
    checkpoint: Box<dyn CheckpointStore>,
    batch_size: u32,
    export_dir: PathBuf,
    cancel_token: Option<CancellationToken>,
    tracker: Option<Arc<ProgressTracker>>,
}

impl Lane {
    pub fn new(
        id: usize,
        range: KeyRange,
        fetcher: Arc<dyn PageFetcher>,
        writer: Arc<dyn BatchWriter>,
        checkpoint: Box<dyn CheckpointStore>,
    ) -> Self {
        Self {
            id,
            range,
            fetcher,
            writer,
            checkpoint,
            batch_size: DEFAULT_BATCH_SIZE,
            export_dir: PathBuf::from("."),
            cancel_token: None,
            tracker: None,
        }
    }

    /// Maximum records per page
    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Directory batch files are written into
    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = dir.into();
        self
    }

    /// Stop before the next fetch once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    pub fn with_progress(mut self, tracker: Arc<ProgressTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_token
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Run the lane to a terminal state
    pub async fn run(self) -> LaneReport {
        let lane = self.id;
        let loaded = self.checkpoint.load().await;
        let (start, discarded) = self.range.resume_point(loaded);
        if discarded {
            warn!(
                lane,
                checkpoint = %loaded,
                range = %self.range,
                "Checkpoint lies outside the lane range, starting from the range start"
            );
        }

        info!(
            lane,
            range = %self.range,
            cursor = %start,
            checkpoint = %self.checkpoint.location(),
            "Lane starting"
        );

        let mut report = LaneReport::new(lane, self.range, start);
        let mut cursor = start;
        let mut seq: u64 = 1;
        let mut pending = Page::empty();
        let mut state = LaneState::Fetch;

        while !state.is_terminal() {
            state = match state {
                LaneState::Fetch => {
                    if self.is_cancelled() {
                        LaneState::Cancelled
                    } else {
                        match self
                            .fetcher
                            .fetch(&cursor, self.range.upper.as_ref(), self.batch_size)
                            .await
                        {
                            Ok(page) if page.is_empty() => LaneState::Done,
                            Ok(page) if page.next_cursor() <= cursor => {
                                error!(lane, cursor = %cursor, "Fetched page does not advance the cursor");
                                report.error = Some(format!(
                                    "page ending at {} does not advance cursor {cursor}",
                                    page.next_cursor()
                                ));
                                LaneState::Failed
                            }
                            Ok(page) => {
                                debug!(lane, cursor = %cursor, records = page.len(), "Fetched page");
                                pending = page;
                                LaneState::Write
                            }
                            Err(e) => {
                                error!(lane, cursor = %cursor, error = %e, "Error fetching batch");
                                report.error = Some(e.to_string());
                                LaneState::Failed
                            }
                        }
                    }
                }
                LaneState::Write => {
                    let path = self.export_dir.join(batch_file_name(seq, lane));
                    match self.writer.write(&pending, &path).await {
                        Ok(bytes) => {
                            let records = pending.len() as u64;
                            cursor = pending.next_cursor();
                            report.batches_written += 1;
                            report.records_exported += records;
                            report.last_cursor = cursor;
                            info!(
                                lane,
                                batch = seq,
                                records,
                                bytes,
                                path = %path.display(),
                                "Exported batch"
                            );
                            if let Some(tracker) = &self.tracker {
                                tracker.add(records);
                            }
                            seq += 1;
                            LaneState::Checkpoint
                        }
                        Err(e) => {
                            error!(
                                lane,
                                batch = seq,
                                path = %path.display(),
                                error = %e,
                                "Error writing batch file"
                            );
                            report.error = Some(e.to_string());
                            LaneState::Failed
                        }
                    }
                }
                LaneState::Checkpoint => {
                    if let Err(e) = self.checkpoint.save(&cursor).await {
                        warn!(lane, cursor = %cursor, error = %e, "Error saving last _id");
                        report.checkpoint_failures += 1;
                    }
                    pending = Page::empty();
                    LaneState::Fetch
                }
                terminal => terminal,
            };
        }

        report.state = state;
        match state {
            LaneState::Done => info!(
                lane,
                batches = report.batches_written,
                records = report.records_exported,
                "No more documents to export"
            ),
            LaneState::Cancelled => info!(lane, cursor = %cursor, "Lane cancelled"),
            _ => error!(
                lane,
                cursor = %cursor,
                error = report.error.as_deref().unwrap_or("unknown"),
                "Lane failed"
            ),
        }
        report
    }
}
