//! Static key-range partitioning for multi-lane exports
//!
//! The key space is divided once, before any lane starts, into contiguous
//! ranges `(b_i, b_i+1]`. The chosen boundaries are persisted next to the
//! checkpoint so a restart with the same lane count reuses them and every
//! per-lane checkpoint still refers to the range it was written for.

use std::path::{Path, PathBuf};

use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use super::checkpoint::{FileCheckpointStore, sync_parent_dir};
use super::cursor::KeyRange;
use super::fetcher::PageFetcher;
use crate::error::{CheckpointError, Result};

/// Persisted partition boundaries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionPlan {
    /// Lane count the plan was built for
    pub lane_count: usize,
    /// Ascending boundary keys as hex strings
    pub split_points: Vec<String>,
    /// RFC 3339 creation time
    pub created_at: String,
}

impl PartitionPlan {
    /// Build a plan from sampled keys, dropping duplicates
    pub fn from_split_points(lane_count: usize, mut points: Vec<ObjectId>) -> Self {
        points.sort();
        points.dedup();
        points.truncate(lane_count.saturating_sub(1));

        Self {
            lane_count,
            split_points: points.iter().map(|p| p.to_hex()).collect(),
            created_at: Utc::now().to_rfc3339(),
        }
    }

    /// Lane ranges described by the plan
    pub fn ranges(&self) -> Result<Vec<KeyRange>> {
        let mut points = Vec::with_capacity(self.split_points.len());
        for hex in &self.split_points {
            let key = ObjectId::parse_str(hex)
                .map_err(|e| CheckpointError::InvalidPlan(format!("{hex}: {e}")))?;
            if points.last().is_some_and(|last| key <= *last) {
                return Err(CheckpointError::InvalidPlan(format!(
                    "split point {hex} is not ascending"
                ))
                .into());
            }
            points.push(key);
        }
        Ok(KeyRange::partition(&points))
    }

    /// Read a plan, treating any problem as "no plan"
    pub async fn load(path: &Path) -> Option<Self> {
        let data = fs::read_to_string(path).await.ok()?;
        match serde_json::from_str(&data) {
            Ok(plan) => Some(plan),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable partition plan");
                None
            }
        }
    }

    /// Persist the plan durably
    pub async fn save(&self, path: &Path) -> Result<()> {
        let failed = |reason: String| CheckpointError::SaveFailed {
            path: path.display().to_string(),
            reason,
        };

        let body = serde_json::to_vec_pretty(self).map_err(|e| failed(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| failed(e.to_string()))?;
        }
        let temp = path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp)
            .await
            .map_err(|e| failed(e.to_string()))?;
        file.write_all(&body).await.map_err(|e| failed(e.to_string()))?;
        file.sync_all().await.map_err(|e| failed(e.to_string()))?;
        drop(file);

        fs::rename(&temp, path)
            .await
            .map_err(|e| failed(e.to_string()))?;
        sync_parent_dir(path).await;
        Ok(())
    }
}

/// Plan file location for a checkpoint base path
pub fn plan_path(checkpoint_base: &Path) -> PathBuf {
    let stem = checkpoint_base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "checkpoint".to_string());
    checkpoint_base.with_file_name(format!("{stem}.plan.json"))
}

/// Decide the lane ranges for this run
///
/// A single lane always covers the full key space. For more lanes a stored
/// plan with a matching lane count is reused; otherwise the fetcher samples
/// new boundaries and any per-lane checkpoints left from a different plan
/// are cleared so no lane resumes inside a range it never exported. Only a
/// plan that fills every lane is saved; a collection too small to split is
/// sampled again on the next run.
pub async fn resolve_ranges(
    fetcher: &dyn PageFetcher,
    lane_count: usize,
    checkpoint_base: &Path,
) -> Result<Vec<KeyRange>> {
    if lane_count <= 1 {
        return Ok(vec![KeyRange::full()]);
    }

    let path = plan_path(checkpoint_base);
    if let Some(plan) = PartitionPlan::load(&path).await {
        if plan.lane_count == lane_count {
            match plan.ranges() {
                Ok(ranges) => {
                    info!(
                        path = %path.display(),
                        lanes = ranges.len(),
                        created_at = %plan.created_at,
                        "Reusing stored partition plan"
                    );
                    return Ok(ranges);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Discarding invalid partition plan"),
            }
        } else {
            warn!(
                stored_lanes = plan.lane_count,
                requested_lanes = lane_count,
                "Lane count changed, building a new partition plan"
            );
        }
    }

    let points = fetcher.split_points(lane_count).await?;
    let plan = PartitionPlan::from_split_points(lane_count, points);
    let ranges = plan.ranges()?;

    for lane in 0..lane_count {
        FileCheckpointStore::for_lane(checkpoint_base, lane, lane_count)
            .reset()
            .await?;
    }

    if ranges.len() < lane_count {
        warn!(
            requested_lanes = lane_count,
            lanes = ranges.len(),
            "Not enough distinct keys to fill every lane, plan not saved"
        );
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(CheckpointError::SaveFailed {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                }
                .into());
            }
        }
        return Ok(ranges);
    }

    plan.save(&path).await?;
    info!(path = %path.display(), lanes = ranges.len(), "Saved new partition plan");
    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::checkpoint::CheckpointStore;
    use crate::export::cursor::Cursor;
    use crate::export::testing::{MemoryStore, key};

    #[test]
    fn test_plan_path() {
        assert_eq!(
            plan_path(Path::new("state/last_id.txt")),
            PathBuf::from("state/last_id.plan.json")
        );
    }

    #[test]
    fn test_plan_dedups_and_sorts_points() {
        let plan = PartitionPlan::from_split_points(4, vec![key(30), key(10), key(10)]);
        assert_eq!(plan.split_points, vec![key(10).to_hex(), key(30).to_hex()]);

        let ranges = plan.ranges().unwrap();
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[1], KeyRange::new(Cursor::at(key(10)), Some(key(30))));
    }

    #[test]
    fn test_invalid_plan_is_rejected() {
        let plan = PartitionPlan {
            lane_count: 2,
            split_points: vec!["zz".to_string()],
            created_at: String::new(),
        };
        assert!(plan.ranges().is_err());
    }

    #[tokio::test]
    async fn test_single_lane_needs_no_plan() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("last_id.txt");
        let store = MemoryStore::with_records(10);

        let ranges = resolve_ranges(&store, 1, &base).await.unwrap();
        assert_eq!(ranges, vec![KeyRange::full()]);
        assert!(!plan_path(&base).exists());
    }

    #[tokio::test]
    async fn test_plan_is_reused_on_restart() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("last_id.txt");

        let first = resolve_ranges(&MemoryStore::with_records(100), 2, &base)
            .await
            .unwrap();
        assert_eq!(first.len(), 2);
        assert!(plan_path(&base).exists());

        // A grown collection would sample differently; the stored plan wins.
        let second = resolve_ranges(&MemoryStore::with_records(1000), 2, &base)
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_new_plan_clears_stale_lane_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("last_id.txt");
        let stale = FileCheckpointStore::for_lane(&base, 1, 3);
        stale.save(&Cursor::at(key(77))).await.unwrap();

        let ranges = resolve_ranges(&MemoryStore::with_records(90), 3, &base)
            .await
            .unwrap();
        assert_eq!(ranges.len(), 3);
        assert!(stale.load().await.is_nil());
    }

    #[tokio::test]
    async fn test_small_collection_uses_fewer_lanes() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("last_id.txt");

        let ranges = resolve_ranges(&MemoryStore::with_records(2), 4, &base)
            .await
            .unwrap();
        assert_eq!(ranges, vec![KeyRange::full()]);
        assert!(!plan_path(&base).exists());
    }

    #[tokio::test]
    async fn test_grown_collection_gets_every_lane_after_small_start() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("last_id.txt");

        let first = resolve_ranges(&MemoryStore::with_records(0), 4, &base)
            .await
            .unwrap();
        assert_eq!(first.len(), 1);

        let second = resolve_ranges(&MemoryStore::with_records(400), 4, &base)
            .await
            .unwrap();
        assert_eq!(second.len(), 4);
        assert!(plan_path(&base).exists());

        let stored = PartitionPlan::load(&plan_path(&base)).await.unwrap();
        assert_eq!(stored.ranges().unwrap(), second);
    }

    #[tokio::test]
    async fn test_saved_plan_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("state").join("last_id.txt");

        resolve_ranges(&MemoryStore::with_records(100), 2, &base)
            .await
            .unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path().join("state"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["last_id.plan.json".to_string()]);
    }
}
