//! Checkpoint persistence
//!
//! A checkpoint is the hex `_id` of the last exported record for one lane.
//! Loading never fails: a missing or unreadable checkpoint is logged and the
//! lane starts from its range's lower bound. Saving writes a sibling
//! temporary file, syncs it and renames it over the checkpoint so a crash
//! never leaves a truncated value behind.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::cursor::Cursor;
use crate::error::{CheckpointError, Result};

/// Durable storage for a single lane's cursor
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Last durably saved cursor, or nil when none is usable
    async fn load(&self) -> Cursor;

    /// Persist `cursor` so the next `load` returns it
    async fn save(&self, cursor: &Cursor) -> Result<()>;

    /// Human-readable location for log lines
    fn location(&self) -> String;
}

/// Checkpoint stored as a single hex string in a text file
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Checkpoint store owned by `lane` out of `lane_count`
    pub fn for_lane(base: &Path, lane: usize, lane_count: usize) -> Self {
        Self::new(lane_checkpoint_path(base, lane, lane_count))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the checkpoint so the lane starts from its lower bound
    pub async fn reset(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(path = %self.path.display(), "Cleared stale checkpoint");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.save_failed(e)),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn save_failed(&self, reason: impl ToString) -> crate::error::ExportError {
        CheckpointError::SaveFailed {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
        .into()
    }

    async fn write_and_sync(&self, temp: &Path, contents: &str) -> std::io::Result<()> {
        let mut file = fs::File::create(temp).await?;
        file.write_all(contents.as_bytes()).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self) -> Cursor {
        let data = match fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No previous checkpoint found. Starting fresh");
                return Cursor::nil();
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to read checkpoint, starting from scratch"
                );
                return Cursor::nil();
            }
        };

        if data.trim().is_empty() {
            info!(path = %self.path.display(), "Checkpoint is empty. Starting fresh");
            return Cursor::nil();
        }

        match Cursor::parse(&data) {
            Some(cursor) => {
                info!(path = %self.path.display(), cursor = %cursor, "Resuming from checkpoint");
                cursor
            }
            None => {
                warn!(
                    path = %self.path.display(),
                    "Invalid _id format in checkpoint, starting from scratch"
                );
                Cursor::nil()
            }
        }
    }

    async fn save(&self, cursor: &Cursor) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.save_failed(e))?;
            }
        }

        let contents = cursor.to_hex().unwrap_or_default();
        let temp = self.temp_path();

        if let Err(e) = self.write_and_sync(&temp, &contents).await {
            let _ = fs::remove_file(&temp).await;
            return Err(self.save_failed(e));
        }

        fs::rename(&temp, &self.path)
            .await
            .map_err(|e| self.save_failed(e))?;
        sync_parent_dir(&self.path).await;

        debug!(path = %self.path.display(), cursor = %cursor, "Checkpoint saved");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Fsync the directory holding `path` so a completed rename is durable
///
/// Best effort: platforms that cannot open a directory as a file skip it.
pub(crate) async fn sync_parent_dir(path: &Path) {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if let Ok(dir) = fs::File::open(parent).await {
        if let Err(e) = dir.sync_all().await {
            debug!(path = %parent.display(), error = %e, "Directory sync skipped");
        }
    }
}

/// Checkpoint file for `lane`
///
/// A single lane uses `base` itself. With several lanes each gets its own
/// `<stem>.lane<N>.<ext>` sibling, so lanes never share a record.
pub fn lane_checkpoint_path(base: &Path, lane: usize, lane_count: usize) -> PathBuf {
    if lane_count <= 1 {
        return base.to_path_buf();
    }
    sibling_path(base, &format!("lane{lane}"))
}

/// `<stem>.<tag>.<ext>` next to `base`
pub(crate) fn sibling_path(base: &Path, tag: &str) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "checkpoint".to_string());

    let name = match base.extension() {
        Some(ext) => format!("{stem}.{tag}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{tag}"),
    };
    base.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;

    #[tokio::test]
    async fn test_missing_checkpoint_loads_nil() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("last_id.txt"));
        assert!(store.load().await.is_nil());
    }

    #[tokio::test]
    async fn test_save_then_load_returns_same_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("last_id.txt"));
        let cursor = Cursor::at(ObjectId::parse_str("65705d84dfc3f3b5094e1f72").unwrap());

        tokio_test::assert_ok!(store.save(&cursor).await);
        assert_eq!(store.load().await, cursor);

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw, "65705d84dfc3f3b5094e1f72");
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_latest_save_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("last_id.txt"));
        let first = Cursor::at(ObjectId::new());
        let second = Cursor::at(ObjectId::new());

        store.save(&first).await.unwrap();
        store.save(&second).await.unwrap();
        assert_eq!(store.load().await, second);
    }

    #[tokio::test]
    async fn test_reload_from_fresh_store_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("last_id.txt");
        let cursor = Cursor::at(ObjectId::new());

        FileCheckpointStore::new(&path).save(&cursor).await.unwrap();
        assert_eq!(FileCheckpointStore::new(&path).load().await, cursor);
    }

    #[tokio::test]
    async fn test_corrupt_checkpoint_loads_nil() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_id.txt");
        std::fs::write(&path, "definitely not hex").unwrap();

        assert!(FileCheckpointStore::new(&path).load().await.is_nil());
    }

    #[tokio::test]
    async fn test_trailing_newline_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_id.txt");
        std::fs::write(&path, "65705d84dfc3f3b5094e1f72\n").unwrap();

        let cursor = FileCheckpointStore::new(&path).load().await;
        assert_eq!(cursor.to_hex().as_deref(), Some("65705d84dfc3f3b5094e1f72"));
    }

    #[tokio::test]
    async fn test_save_into_unwritable_location_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let store = FileCheckpointStore::new(blocker.join("last_id.txt"));
        let result = store.save(&Cursor::at(ObjectId::new())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_reset_removes_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("last_id.txt"));
        store.save(&Cursor::at(ObjectId::new())).await.unwrap();

        store.reset().await.unwrap();
        assert!(store.load().await.is_nil());
        store.reset().await.unwrap();
    }

    #[tokio::test]
    async fn test_save_leaves_only_the_checkpoint_in_its_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("state").join("last_id.txt"));
        store.save(&Cursor::at(ObjectId::new())).await.unwrap();
        store.save(&Cursor::at(ObjectId::new())).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path().join("state"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("last_id.txt")]);
    }

    #[tokio::test]
    async fn test_sync_parent_dir_tolerates_bare_and_missing_paths() {
        sync_parent_dir(Path::new("last_id.txt")).await;
        sync_parent_dir(Path::new("/nonexistent/dir/last_id.txt")).await;

        let dir = tempfile::tempdir().unwrap();
        sync_parent_dir(&dir.path().join("last_id.txt")).await;
    }

    #[test]
    fn test_lane_checkpoint_paths() {
        let base = Path::new("state/last_id.txt");
        assert_eq!(lane_checkpoint_path(base, 0, 1), PathBuf::from("state/last_id.txt"));
        assert_eq!(
            lane_checkpoint_path(base, 2, 4),
            PathBuf::from("state/last_id.lane2.txt")
        );
        assert_eq!(
            lane_checkpoint_path(Path::new("cursor"), 1, 2),
            PathBuf::from("cursor.lane1")
        );
    }
}
