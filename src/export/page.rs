//! Pages of records returned by a fetch
//!
//! A page is validated on construction: every record carries an ObjectId
//! `_id`, keys are strictly ascending, and all of them lie inside the
//! requested window `(cursor, upper]`. The last key becomes the next cursor.

use mongodb::bson::{Document, oid::ObjectId};

use super::cursor::Cursor;
use crate::error::{FetchError, Result};

/// One bounded, ordered batch of records
#[derive(Debug, Clone, Default)]
pub struct Page {
    records: Vec<Document>,
    last_key: Option<ObjectId>,
}

impl Page {
    /// The termination page
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validate `records` as the answer to a fetch after `cursor`
    ///
    /// # Arguments
    /// * `records` - Records in the order the store returned them
    /// * `cursor` - Exclusive lower bound of the request
    /// * `upper` - Optional inclusive upper bound of the request
    pub fn from_records(
        records: Vec<Document>,
        cursor: &Cursor,
        upper: Option<&ObjectId>,
    ) -> Result<Self> {
        let mut previous = *cursor;

        for (position, record) in records.iter().enumerate() {
            let key = record
                .get_object_id("_id")
                .map_err(|_| FetchError::MissingKey { position })?;

            let past_upper = upper.is_some_and(|upper| &key > upper);
            if Cursor::at(key) <= previous || past_upper {
                return Err(FetchError::OutOfOrder {
                    position,
                    key: key.to_hex(),
                }
                .into());
            }
            previous = Cursor::at(key);
        }

        Ok(Self {
            last_key: previous.key().filter(|_| !records.is_empty()),
            records,
        })
    }

    pub fn records(&self) -> &[Document] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Maximum key in the page
    pub fn last_key(&self) -> Option<ObjectId> {
        self.last_key
    }

    /// Cursor to fetch the following page with
    ///
    /// Empty pages have no successor and return the nil cursor.
    pub fn next_cursor(&self) -> Cursor {
        self.last_key.map(Cursor::at).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    fn oid(n: u64) -> ObjectId {
        let mut bytes = [0u8; 12];
        bytes[4..].copy_from_slice(&n.to_be_bytes());
        ObjectId::from_bytes(bytes)
    }

    #[test]
    fn test_valid_page_sets_next_cursor() {
        let records = vec![doc! { "_id": oid(2) }, doc! { "_id": oid(3) }];
        let page = Page::from_records(records, &Cursor::at(oid(1)), None).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page.last_key(), Some(oid(3)));
        assert_eq!(page.next_cursor(), Cursor::at(oid(3)));
    }

    #[test]
    fn test_empty_page() {
        let page = Page::from_records(Vec::new(), &Cursor::at(oid(9)), None).unwrap();
        assert!(page.is_empty());
        assert_eq!(page.last_key(), None);
        assert!(page.next_cursor().is_nil());
    }

    #[test]
    fn test_rejects_record_at_or_before_cursor() {
        let records = vec![doc! { "_id": oid(5) }];
        let err = Page::from_records(records, &Cursor::at(oid(5)), None).unwrap_err();
        assert!(err.to_string().contains("out of order"));
    }

    #[test]
    fn test_rejects_descending_keys() {
        let records = vec![doc! { "_id": oid(3) }, doc! { "_id": oid(2) }];
        assert!(Page::from_records(records, &Cursor::nil(), None).is_err());
    }

    #[test]
    fn test_rejects_key_past_upper_bound() {
        let records = vec![doc! { "_id": oid(3) }, doc! { "_id": oid(8) }];
        assert!(Page::from_records(records, &Cursor::nil(), Some(&oid(5))).is_err());
    }

    #[test]
    fn test_rejects_missing_or_non_objectid_key() {
        let records = vec![doc! { "name": "no id" }];
        assert!(Page::from_records(records, &Cursor::nil(), None).is_err());

        let records = vec![doc! { "_id": 42 }];
        let err = Page::from_records(records, &Cursor::nil(), None).unwrap_err();
        assert!(err.to_string().contains("position 0"));
    }
}
