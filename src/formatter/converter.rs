//! BSON to JSON value conversion
//!
//! Batch files hold plain JSON rather than MongoDB extended JSON, so BSON
//! specific types are simplified to the closest JSON representation.

use mongodb::bson::{Binary, Bson, DateTime, Decimal128, Document, Regex, Timestamp, oid::ObjectId};
use serde_json::Value as JsonValue;

use super::helpers::{binary_to_base64, datetime_to_iso_string};

/// Core trait for BSON value conversion
pub trait BsonConverter {
    /// Output type of the conversion
    type Output;

    /// Convert a BSON value to the output type
    fn convert(&self, value: &Bson) -> Self::Output;

    /// Convert a BSON document
    fn convert_document(&self, doc: &Document) -> Self::Output;
}

/// Simplified JSON converter
///
/// - ObjectId becomes its hex string
/// - DateTime becomes an RFC 3339 string
/// - Int64 becomes a plain number
/// - Binary becomes base64
/// - Decimal128 keeps every digit as `{"$numberDecimal": "..."}`
/// - NaN and infinite doubles become `{"$numberDouble": "..."}`
///
/// Keys keep their document order.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonConverter;

impl JsonConverter {
    /// Create a new JSON converter
    pub fn new() -> Self {
        Self
    }

    fn convert_object_id(&self, oid: &ObjectId) -> JsonValue {
        JsonValue::String(oid.to_hex())
    }

    fn convert_datetime(&self, dt: &DateTime) -> JsonValue {
        JsonValue::String(datetime_to_iso_string(dt))
    }

    fn convert_decimal128(&self, d: &Decimal128) -> JsonValue {
        Bson::Decimal128(*d).into_relaxed_extjson()
    }

    fn convert_double(&self, f: f64) -> JsonValue {
        match serde_json::Number::from_f64(f) {
            Some(n) => JsonValue::Number(n),
            None => Bson::Double(f).into_relaxed_extjson(),
        }
    }

    fn convert_binary(&self, bin: &Binary) -> JsonValue {
        JsonValue::String(binary_to_base64(bin))
    }

    fn convert_regex(&self, regex: &Regex) -> JsonValue {
        JsonValue::String(format!("/{}/{}", regex.pattern, regex.options))
    }

    fn convert_timestamp(&self, ts: &Timestamp) -> JsonValue {
        let mut map = serde_json::Map::new();
        map.insert("t".to_string(), JsonValue::Number(ts.time.into()));
        map.insert("i".to_string(), JsonValue::Number(ts.increment.into()));
        JsonValue::Object(map)
    }
}

impl BsonConverter for JsonConverter {
    type Output = JsonValue;

    fn convert(&self, value: &Bson) -> JsonValue {
        match value {
            Bson::String(s) => JsonValue::String(s.clone()),
            Bson::Int32(n) => JsonValue::Number((*n).into()),
            Bson::Int64(n) => JsonValue::Number((*n).into()),
            Bson::Double(f) => self.convert_double(*f),
            Bson::Boolean(b) => JsonValue::Bool(*b),
            Bson::Null | Bson::Undefined => JsonValue::Null,
            Bson::ObjectId(oid) => self.convert_object_id(oid),
            Bson::DateTime(dt) => self.convert_datetime(dt),
            Bson::Decimal128(d) => self.convert_decimal128(d),
            Bson::Array(arr) => JsonValue::Array(arr.iter().map(|v| self.convert(v)).collect()),
            Bson::Document(doc) => self.convert_document(doc),
            Bson::Binary(bin) => self.convert_binary(bin),
            Bson::RegularExpression(regex) => self.convert_regex(regex),
            Bson::Timestamp(ts) => self.convert_timestamp(ts),
            Bson::MinKey => JsonValue::String("MinKey".to_string()),
            Bson::MaxKey => JsonValue::String("MaxKey".to_string()),
            other => other.clone().into_relaxed_extjson(),
        }
    }

    fn convert_document(&self, doc: &Document) -> JsonValue {
        let mut map = serde_json::Map::new();
        for (key, value) in doc.iter() {
            map.insert(key.clone(), self.convert(value));
        }
        JsonValue::Object(map)
    }
}
