//! Helper functions for BSON value conversion

use mongodb::bson::{Binary, DateTime};

/// Convert DateTime to ISO 8601 string
///
/// Falls back to the raw millisecond timestamp for dates outside the
/// RFC 3339 range.
pub fn datetime_to_iso_string(dt: &DateTime) -> String {
    dt.try_to_rfc3339_string()
        .unwrap_or_else(|_| format!("{}", dt.timestamp_millis()))
}

/// Convert Binary data to Base64 string
pub fn binary_to_base64(bin: &Binary) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(&bin.bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::spec::BinarySubtype;

    #[test]
    fn test_out_of_range_datetime_falls_back_to_millis() {
        let dt = DateTime::from_millis(i64::MAX);
        assert_eq!(datetime_to_iso_string(&dt), i64::MAX.to_string());
    }

    #[test]
    fn test_binary_to_base64() {
        let bin = Binary {
            subtype: BinarySubtype::Generic,
            bytes: b"hello".to_vec(),
        };
        assert_eq!(binary_to_base64(&bin), "aGVsbG8=");
    }
}
