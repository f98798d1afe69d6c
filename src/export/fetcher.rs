//! Page fetching from the remote store
//!
//! The fetcher pushes the `_id > cursor` predicate, the ascending sort and
//! the limit down to the server, so every call costs O(limit) through the
//! `_id` index regardless of collection size.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::Collection;
use mongodb::bson::{Document, doc, oid::ObjectId};
use mongodb::options::Hint;
use tracing::{debug, info};

use super::cursor::Cursor;
use super::page::Page;
use crate::error::{FetchError, Result};

/// Source of ordered pages
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch up to `limit` records with `cursor < _id <= upper`, ascending
    ///
    /// An empty page means there is nothing left after `cursor`; it is the
    /// only termination signal a lane recognizes.
    async fn fetch(&self, cursor: &Cursor, upper: Option<&ObjectId>, limit: u32) -> Result<Page>;

    /// Keys splitting the record set into `parts` similarly sized ranges
    ///
    /// Returns ascending keys; fewer than `parts - 1` means fewer ranges.
    /// The default offers no split points, which keeps a single lane.
    async fn split_points(&self, parts: usize) -> Result<Vec<ObjectId>> {
        let _ = parts;
        Ok(Vec::new())
    }
}

/// Build the `_id` window filter for a fetch
pub fn range_filter(cursor: &Cursor, upper: Option<&ObjectId>) -> Document {
    let mut bounds = Document::new();
    if let Some(key) = cursor.key() {
        bounds.insert("$gt", key);
    }
    if let Some(upper) = upper {
        bounds.insert("$lte", *upper);
    }

    if bounds.is_empty() {
        Document::new()
    } else {
        doc! { "_id": bounds }
    }
}

/// Page fetcher backed by a MongoDB collection
#[derive(Clone)]
pub struct MongoPageFetcher {
    collection: Collection<Document>,
}

impl MongoPageFetcher {
    pub fn new(collection: Collection<Document>) -> Self {
        Self { collection }
    }

    fn id_index() -> Hint {
        Hint::Keys(doc! { "_id": 1 })
    }

    /// Collection size from metadata, without scanning
    pub async fn estimated_count(&self) -> Result<u64> {
        self.collection
            .estimated_document_count()
            .await
            .map_err(|e| FetchError::QueryFailed(e.to_string()).into())
    }

    /// `_id` of the record at `offset` in index order
    async fn key_at_offset(&self, offset: u64) -> Result<Option<ObjectId>> {
        let found = self
            .collection
            .find_one(Document::new())
            .sort(doc! { "_id": 1 })
            .skip(offset)
            .projection(doc! { "_id": 1 })
            .hint(Self::id_index())
            .await
            .map_err(|e| FetchError::SamplingFailed(e.to_string()))?;

        match found {
            Some(record) => record.get_object_id("_id").map(Some).map_err(|_| {
                FetchError::SamplingFailed(format!("non-ObjectId _id at offset {offset}")).into()
            }),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl PageFetcher for MongoPageFetcher {
    async fn fetch(&self, cursor: &Cursor, upper: Option<&ObjectId>, limit: u32) -> Result<Page> {
        let filter = range_filter(cursor, upper);
        debug!(cursor = %cursor, limit, filter = %filter, "Fetching page");

        let results = self
            .collection
            .find(filter)
            .sort(doc! { "_id": 1 })
            .limit(i64::from(limit))
            .batch_size(limit)
            .hint(Self::id_index())
            .await
            .map_err(|e| FetchError::QueryFailed(e.to_string()))?;

        let records: Vec<Document> = results
            .try_collect()
            .await
            .map_err(|e| FetchError::DecodeFailed(e.to_string()))?;

        Page::from_records(records, cursor, upper)
    }

    async fn split_points(&self, parts: usize) -> Result<Vec<ObjectId>> {
        if parts <= 1 {
            return Ok(Vec::new());
        }

        let total = self.estimated_count().await?;
        info!(total, parts, "Sampling _id index for range partitioning");
        if total < parts as u64 {
            return Ok(Vec::new());
        }

        let mut points: Vec<ObjectId> = Vec::with_capacity(parts - 1);
        for part in 1..parts as u64 {
            let offset = total * part / parts as u64 - 1;
            match self.key_at_offset(offset).await? {
                Some(key) if points.last().is_none_or(|last| key > *last) => points.push(key),
                Some(_) => {}
                None => break,
            }
        }

        debug!(split_points = points.len(), "Key sampling finished");
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_from_start_is_empty() {
        assert_eq!(range_filter(&Cursor::nil(), None), doc! {});
    }

    #[test]
    fn test_filter_is_strictly_greater_than_cursor() {
        let key = ObjectId::parse_str("65705d84dfc3f3b5094e1f72").unwrap();
        assert_eq!(
            range_filter(&Cursor::at(key), None),
            doc! { "_id": { "$gt": key } }
        );
    }

    #[test]
    fn test_filter_with_upper_bound() {
        let lower = ObjectId::parse_str("65705d84dfc3f3b5094e1f72").unwrap();
        let upper = ObjectId::parse_str("65705d84dfc3f3b5094e1f99").unwrap();
        assert_eq!(
            range_filter(&Cursor::at(lower), Some(&upper)),
            doc! { "_id": { "$gt": lower, "$lte": upper } }
        );
        assert_eq!(
            range_filter(&Cursor::nil(), Some(&upper)),
            doc! { "_id": { "$lte": upper } }
        );
    }

    #[tokio::test]
    async fn test_default_split_points_is_empty() {
        struct NoSampling;

        #[async_trait]
        impl PageFetcher for NoSampling {
            async fn fetch(&self, _: &Cursor, _: Option<&ObjectId>, _: u32) -> Result<Page> {
                Ok(Page::empty())
            }
        }

        assert!(NoSampling.split_points(4).await.unwrap().is_empty());
    }
}
