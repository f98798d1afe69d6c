//! Batch file writing
//!
//! Each page becomes one JSON array file. The file is assembled under a
//! `.partial` name, synced, and renamed into place, so a batch file that
//! exists under its final name is always complete.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::checkpoint::sync_parent_dir;
use super::page::Page;
use crate::error::{Result, WriteError};
use crate::formatter::JsonFormatter;

/// Serializes pages to output files
#[async_trait]
pub trait BatchWriter: Send + Sync {
    /// Write `page` to a fresh file at `destination`
    ///
    /// # Returns
    /// * `Result<u64>` - Number of bytes written
    async fn write(&self, page: &Page, destination: &Path) -> Result<u64>;
}

/// File name for batch `seq` of `lane`
pub fn batch_file_name(seq: u64, lane: usize) -> String {
    format!("batch_{seq}_worker_{lane}.json")
}

/// Writer producing a JSON array of objects per batch
#[derive(Debug, Clone, Default)]
pub struct JsonBatchWriter {
    formatter: JsonFormatter,
}

impl JsonBatchWriter {
    /// Create a writer
    ///
    /// # Arguments
    /// * `pretty` - Indent output with two spaces; compact when false
    pub fn new(pretty: bool) -> Self {
        Self {
            formatter: JsonFormatter::new(pretty, 2),
        }
    }

    fn partial_path(destination: &Path) -> PathBuf {
        let mut name = OsString::from(destination.as_os_str());
        name.push(".partial");
        PathBuf::from(name)
    }
}

#[async_trait]
impl BatchWriter for JsonBatchWriter {
    async fn write(&self, page: &Page, destination: &Path) -> Result<u64> {
        let body = self.formatter.format_documents(page.records())?;
        let partial = Self::partial_path(destination);

        let mut file = File::create(&partial)
            .await
            .map_err(|e| WriteError::CreateFailed {
                path: destination.display().to_string(),
                reason: e.to_string(),
            })?;

        let written = async {
            file.write_all(&body).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        drop(file);

        if let Err(e) = written {
            let _ = fs::remove_file(&partial).await;
            return Err(WriteError::PersistFailed {
                path: destination.display().to_string(),
                reason: e.to_string(),
            }
            .into());
        }

        if let Err(e) = fs::rename(&partial, destination).await {
            let _ = fs::remove_file(&partial).await;
            return Err(WriteError::PersistFailed {
                path: destination.display().to_string(),
                reason: e.to_string(),
            }
            .into());
        }
        sync_parent_dir(destination).await;

        debug!(
            path = %destination.display(),
            records = page.len(),
            bytes = body.len(),
            "Batch file written"
        );
        Ok(body.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::cursor::Cursor;
    use mongodb::bson::{doc, oid::ObjectId};

    fn page_of(n: usize) -> Page {
        let records = (0..n)
            .map(|i| {
                let mut bytes = [0u8; 12];
                bytes[4..].copy_from_slice(&(i as u64 + 1).to_be_bytes());
                doc! { "_id": ObjectId::from_bytes(bytes), "seq": i as i64 }
            })
            .collect();
        Page::from_records(records, &Cursor::nil(), None).unwrap()
    }

    #[test]
    fn test_batch_file_name() {
        assert_eq!(batch_file_name(1, 0), "batch_1_worker_0.json");
        assert_eq!(batch_file_name(12, 3), "batch_12_worker_3.json");
    }

    #[tokio::test]
    async fn test_writes_indented_array_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(batch_file_name(1, 0));

        let bytes = JsonBatchWriter::new(true)
            .write(&page_of(3), &path)
            .await
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(bytes, content.len() as u64);
        assert!(content.starts_with("[\n  {"));

        let parsed: Vec<serde_json::Value> = serde_json::from_str(&content).unwrap();
        let seqs: Vec<i64> = parsed.iter().map(|v| v["seq"].as_i64().unwrap()).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert!(!JsonBatchWriter::partial_path(&path).exists());
    }

    #[tokio::test]
    async fn test_overwrites_existing_batch_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(batch_file_name(1, 0));
        std::fs::write(&path, "stale content from an aborted run").unwrap();

        JsonBatchWriter::new(false)
            .write(&page_of(2), &path)
            .await
            .unwrap();

        let parsed: Vec<serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[tokio::test]
    async fn test_consecutive_batches_leave_no_partial_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = JsonBatchWriter::new(true);
        for seq in 1..=3 {
            writer
                .write(&page_of(2), &dir.path().join(batch_file_name(seq, 0)))
                .await
                .unwrap();
        }

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "batch_1_worker_0.json",
                "batch_2_worker_0.json",
                "batch_3_worker_0.json"
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_directory_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join(batch_file_name(1, 0));

        let result = JsonBatchWriter::default().write(&page_of(1), &path).await;
        assert!(matches!(
            result,
            Err(crate::error::ExportError::Write(WriteError::CreateFailed { .. }))
        ));
        assert!(!path.exists());
    }
}
