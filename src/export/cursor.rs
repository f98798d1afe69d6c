//! Cursor positions and lane key ranges
//!
//! A cursor is the `_id` of the last exported record. The nil cursor sorts
//! before every key and means "start of set".

use std::fmt;

use mongodb::bson::oid::ObjectId;

/// Resume position within the `_id`-ordered record set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor(Option<ObjectId>);

impl Cursor {
    /// The start-of-set cursor
    pub const fn nil() -> Self {
        Self(None)
    }

    /// Cursor positioned on `key`; the next page starts strictly after it
    pub const fn at(key: ObjectId) -> Self {
        Self(Some(key))
    }

    /// Parse the textual checkpoint form (24 hex digits)
    ///
    /// Returns `None` for anything that is not a valid ObjectId.
    pub fn parse(text: &str) -> Option<Self> {
        ObjectId::parse_str(text.trim()).ok().map(Self::at)
    }

    pub fn key(&self) -> Option<ObjectId> {
        self.0
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_none()
    }

    /// Hex form written to checkpoint files
    pub fn to_hex(&self) -> Option<String> {
        self.0.map(|key| key.to_hex())
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(key) => write!(f, "{}", key.to_hex()),
            None => write!(f, "<start>"),
        }
    }
}

impl From<ObjectId> for Cursor {
    fn from(key: ObjectId) -> Self {
        Self::at(key)
    }
}

/// Contiguous slice of the key space owned by one lane
///
/// Covers keys `k` with `lower < k <= upper`; a missing upper bound is
/// unbounded. Adjacent ranges share a boundary key that belongs to the
/// lower range only, so a set of ranges built from sorted split points has
/// no gaps and no overlaps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyRange {
    /// Exclusive lower bound, also the lane's initial cursor
    pub lower: Cursor,
    /// Inclusive upper bound
    pub upper: Option<ObjectId>,
}

impl KeyRange {
    /// The whole key space
    pub const fn full() -> Self {
        Self {
            lower: Cursor::nil(),
            upper: None,
        }
    }

    pub fn new(lower: Cursor, upper: Option<ObjectId>) -> Self {
        Self { lower, upper }
    }

    /// Build consecutive ranges from ascending split keys
    ///
    /// `n` split points yield `n + 1` ranges.
    pub fn partition(split_points: &[ObjectId]) -> Vec<KeyRange> {
        let mut ranges = Vec::with_capacity(split_points.len() + 1);
        let mut lower = Cursor::nil();
        for point in split_points {
            ranges.push(KeyRange::new(lower, Some(*point)));
            lower = Cursor::at(*point);
        }
        ranges.push(KeyRange::new(lower, None));
        ranges
    }

    pub fn contains(&self, key: &ObjectId) -> bool {
        let above_lower = match self.lower.key() {
            Some(lower) => *key > lower,
            None => true,
        };
        let below_upper = match &self.upper {
            Some(upper) => key <= upper,
            None => true,
        };
        above_lower && below_upper
    }

    /// Pick where a lane resumes given its loaded checkpoint
    ///
    /// A checkpoint inside the range wins; nil or out-of-range checkpoints
    /// fall back to the lower bound. The second value reports whether the
    /// checkpoint was discarded for being out of range.
    pub fn resume_point(&self, checkpoint: Cursor) -> (Cursor, bool) {
        match checkpoint.key() {
            None => (self.lower, false),
            Some(_) if checkpoint == self.lower => (self.lower, false),
            Some(key) if self.contains(&key) => (checkpoint, false),
            Some(_) => (self.lower, true),
        }
    }
}

impl fmt::Display for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.upper {
            Some(upper) => write!(f, "({}, {}]", self.lower, upper.to_hex()),
            None => write!(f, "({}, <end>)", self.lower),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(n: u64) -> ObjectId {
        let mut bytes = [0u8; 12];
        bytes[4..].copy_from_slice(&n.to_be_bytes());
        ObjectId::from_bytes(bytes)
    }

    #[test]
    fn test_nil_sorts_first() {
        assert!(Cursor::nil() < Cursor::at(oid(0)));
        assert!(Cursor::at(oid(1)) < Cursor::at(oid(2)));
        assert!(Cursor::default().is_nil());
    }

    #[test]
    fn test_parse_checkpoint_text() {
        let cursor = Cursor::parse("65705d84dfc3f3b5094e1f72\n").unwrap();
        assert_eq!(cursor.to_hex().as_deref(), Some("65705d84dfc3f3b5094e1f72"));
        assert!(Cursor::parse("not-an-id").is_none());
        assert!(Cursor::parse("").is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(Cursor::nil().to_string(), "<start>");
        assert_eq!(
            KeyRange::new(Cursor::nil(), Some(oid(5))).to_string(),
            format!("(<start>, {}]", oid(5).to_hex())
        );
    }

    #[test]
    fn test_partition_is_gapless() {
        let ranges = KeyRange::partition(&[oid(10), oid(20)]);
        assert_eq!(ranges.len(), 3);

        for n in 0..40 {
            let owners = ranges.iter().filter(|r| r.contains(&oid(n))).count();
            assert_eq!(owners, 1, "key {n} must belong to exactly one range");
        }
        assert!(ranges[0].contains(&oid(10)));
        assert!(ranges[1].contains(&oid(11)));
        assert!(!ranges[1].contains(&oid(10)));
    }

    #[test]
    fn test_partition_without_split_points_is_full_range() {
        assert_eq!(KeyRange::partition(&[]), vec![KeyRange::full()]);
    }

    #[test]
    fn test_resume_point() {
        let range = KeyRange::new(Cursor::at(oid(10)), Some(oid(20)));

        assert_eq!(range.resume_point(Cursor::nil()), (Cursor::at(oid(10)), false));
        assert_eq!(range.resume_point(Cursor::at(oid(15))), (Cursor::at(oid(15)), false));
        assert_eq!(range.resume_point(Cursor::at(oid(20))), (Cursor::at(oid(20)), false));
        assert_eq!(range.resume_point(Cursor::at(oid(25))), (Cursor::at(oid(10)), true));
        assert_eq!(range.resume_point(Cursor::at(oid(5))), (Cursor::at(oid(10)), true));
    }
}
