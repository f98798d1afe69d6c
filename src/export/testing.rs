//! In-memory collaborators for engine tests

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use mongodb::bson::{Document, doc, oid::ObjectId};

use super::cursor::Cursor;
use super::fetcher::PageFetcher;
use super::page::Page;
use super::writer::BatchWriter;
use crate::error::{FetchError, Result, WriteError};

/// Deterministic ObjectId whose order follows `n`
pub fn key(n: u64) -> ObjectId {
    let mut bytes = [0u8; 12];
    bytes[0] = 0x65;
    bytes[4..].copy_from_slice(&n.to_be_bytes());
    ObjectId::from_bytes(bytes)
}

/// Index of a record produced by [`MemoryStore::with_records`]
pub fn record_number(doc: &Document) -> u64 {
    doc.get_i64("n").expect("test record without n") as u64
}

/// Sorted in-memory collection answering range queries
pub struct MemoryStore {
    records: Vec<Document>,
    requests: Mutex<Vec<(Cursor, Option<ObjectId>)>>,
    fail_on_call: Option<usize>,
    calls: AtomicUsize,
}

impl MemoryStore {
    /// Records numbered `1..=count` with ascending keys
    pub fn with_records(count: u64) -> Self {
        let records = (1..=count)
            .map(|n| doc! { "_id": key(n), "n": n as i64, "payload": format!("record-{n}") })
            .collect();
        Self {
            records,
            requests: Mutex::new(Vec::new()),
            fail_on_call: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Make the `call`-th fetch (1-based) fail with a query error
    pub fn failing_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    /// Cursors and upper bounds of every fetch so far
    pub fn requests(&self) -> Vec<(Cursor, Option<ObjectId>)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for MemoryStore {
    async fn fetch(&self, cursor: &Cursor, upper: Option<&ObjectId>, limit: u32) -> Result<Page> {
        self.requests.lock().unwrap().push((*cursor, upper.copied()));
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_call == Some(call) {
            return Err(FetchError::QueryFailed("connection reset by peer".to_string()).into());
        }

        let page: Vec<Document> = self
            .records
            .iter()
            .filter(|doc| {
                let id = doc.get_object_id("_id").unwrap();
                Cursor::at(id) > *cursor && upper.is_none_or(|upper| id <= *upper)
            })
            .take(limit as usize)
            .cloned()
            .collect();

        Page::from_records(page, cursor, upper)
    }

    async fn split_points(&self, parts: usize) -> Result<Vec<ObjectId>> {
        let total = self.records.len();
        if parts <= 1 || total < parts {
            return Ok(Vec::new());
        }
        Ok((1..parts)
            .map(|part| {
                let offset = total * part / parts - 1;
                self.records[offset].get_object_id("_id").unwrap()
            })
            .collect())
    }
}

/// Writer that remembers pages instead of touching disk
#[derive(Default)]
pub struct MemoryWriter {
    written: Mutex<Vec<(PathBuf, Vec<u64>)>>,
    fail_on_write: Option<usize>,
    attempts: AtomicUsize,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `write`-th call (1-based) fail
    pub fn failing_on_write(write: usize) -> Self {
        Self {
            fail_on_write: Some(write),
            ..Self::default()
        }
    }

    /// Destination and record numbers of every successful write
    pub fn written(&self) -> Vec<(PathBuf, Vec<u64>)> {
        self.written.lock().unwrap().clone()
    }

    /// All record numbers written, in write order
    pub fn all_records(&self) -> Vec<u64> {
        self.written()
            .into_iter()
            .flat_map(|(_, records)| records)
            .collect()
    }
}

#[async_trait]
impl BatchWriter for MemoryWriter {
    async fn write(&self, page: &Page, destination: &Path) -> Result<u64> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_write == Some(attempt) {
            return Err(WriteError::CreateFailed {
                path: destination.display().to_string(),
                reason: "permission denied".to_string(),
            }
            .into());
        }
        let numbers: Vec<u64> = page.records().iter().map(record_number).collect();
        let size = numbers.len() as u64;
        self.written
            .lock()
            .unwrap()
            .push((destination.to_path_buf(), numbers));
        Ok(size)
    }
}
