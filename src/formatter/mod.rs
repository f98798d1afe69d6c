//! Output formatting for batch files
//!
//! Converts BSON documents to simplified JSON and renders a page as a JSON
//! array, either indented (the default batch file layout) or compact.

mod converter;
mod helpers;

pub use converter::{BsonConverter, JsonConverter};

use mongodb::bson::Document;
use serde::Serialize;

use crate::error::{Result, WriteError};

/// JSON array formatter for pages of documents
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    /// Enable pretty printing
    pretty: bool,

    /// Indentation width in spaces
    indent: usize,

    /// Converter for BSON to JSON
    converter: JsonConverter,
}

impl JsonFormatter {
    /// Create a new JSON formatter
    ///
    /// # Arguments
    /// * `pretty` - Enable pretty printing
    /// * `indent` - Indentation width used when pretty printing
    pub fn new(pretty: bool, indent: usize) -> Self {
        Self {
            pretty,
            indent,
            converter: JsonConverter::new(),
        }
    }

    /// Render documents as a JSON array, in the order given
    pub fn format_documents(&self, docs: &[Document]) -> Result<Vec<u8>> {
        let values: Vec<serde_json::Value> = docs
            .iter()
            .map(|doc| self.converter.convert_document(doc))
            .collect();

        let mut buf = if self.pretty {
            self.to_pretty_vec(&values)
        } else {
            serde_json::to_vec(&values)
        }
        .map_err(|e| WriteError::SerializeFailed(e.to_string()))?;

        buf.push(b'\n');
        Ok(buf)
    }

    /// Serialize with a custom indentation width
    fn to_pretty_vec<T: Serialize>(&self, value: &T) -> serde_json::Result<Vec<u8>> {
        let mut buf = Vec::new();
        let indent = " ".repeat(self.indent);
        let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        value.serialize(&mut ser)?;
        Ok(buf)
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new(true, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{doc, oid::ObjectId};

    #[test]
    fn test_pretty_array_of_objects() {
        let formatter = JsonFormatter::default();
        let oid = ObjectId::parse_str("65705d84dfc3f3b5094e1f72").unwrap();
        let docs = vec![doc! { "_id": oid, "n": 1 }, doc! { "_id": oid, "n": 2 }];

        let out = String::from_utf8(formatter.format_documents(&docs).unwrap()).unwrap();
        assert!(out.starts_with("[\n  {\n"));
        assert!(out.contains("\"_id\": \"65705d84dfc3f3b5094e1f72\""));
        assert!(out.ends_with("]\n"));

        let parsed: Vec<serde_json::Value> = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1]["n"], 2);
    }

    #[test]
    fn test_compact_output() {
        let formatter = JsonFormatter::new(false, 2);
        let docs = vec![doc! { "a": 1 }];
        let out = String::from_utf8(formatter.format_documents(&docs).unwrap()).unwrap();
        assert_eq!(out, "[{\"a\":1}]\n");
    }

    #[test]
    fn test_fields_keep_document_order() {
        let formatter = JsonFormatter::new(false, 2);
        let docs = vec![doc! { "_id": 1, "zeta": true, "alpha": 2.5 }];
        let out = String::from_utf8(formatter.format_documents(&docs).unwrap()).unwrap();
        assert_eq!(out, "[{\"_id\":1,\"zeta\":true,\"alpha\":2.5}]\n");
    }

    #[test]
    fn test_empty_page_is_empty_array() {
        let formatter = JsonFormatter::default();
        let out = String::from_utf8(formatter.format_documents(&[]).unwrap()).unwrap();
        assert_eq!(out, "[]\n");
    }
}
