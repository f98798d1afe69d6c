//! Resumable batch export engine
//!
//! The record set is read in ascending `_id` order, one page at a time, and
//! every page lands in its own batch file. After each written page the lane
//! persists the page's last `_id`, so a restarted run continues strictly
//! after the last durable checkpoint.
//!
//! # Architecture
//!
//! ```text
//! ExportCoordinator
//!   ├─ partition   (key ranges, persisted plan)
//!   └─ Lane × N    (tokio tasks)
//!        ├─ PageFetcher      (cursor-paginated queries)
//!        ├─ BatchWriter      (one JSON array file per page)
//!        └─ CheckpointStore  (one cursor file per lane)
//! ```

pub mod checkpoint;
pub mod coordinator;
pub mod cursor;
pub mod fetcher;
pub mod lane;
pub mod page;
pub mod partition;
pub mod progress;
pub mod writer;

#[cfg(test)]
mod testing;

pub use checkpoint::{CheckpointStore, FileCheckpointStore, lane_checkpoint_path};
pub use coordinator::{ExportCoordinator, ExportOptions, ExportSummary};
pub use cursor::{Cursor, KeyRange};
pub use fetcher::{MongoPageFetcher, PageFetcher};
pub use lane::{Lane, LaneReport, LaneState};
pub use page::Page;
pub use partition::PartitionPlan;
pub use progress::ProgressTracker;
pub use writer::{BatchWriter, JsonBatchWriter, batch_file_name};
