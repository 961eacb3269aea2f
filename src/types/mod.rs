//! Core record and field types shared by the ingest and query paths

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

mod field;

pub use field::{FieldPolicy, IndexedField, MaskingPolicy};

/// Record identifier, unique within a data type
pub type RecordUid = String;

/// Milliseconds in one day; global index timestamps are truncated to this
pub const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Column visibility bytes, evaluated by the backing store against a
/// caller's authorization set. Opaque to this crate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Visibility(pub Vec<u8>);

impl Visibility {
    pub fn new(expr: impl Into<Vec<u8>>) -> Self {
        Self(expr.into())
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for Visibility {
    fn from(expr: &str) -> Self {
        Self(expr.as_bytes().to_vec())
    }
}

/// Identifies one event within a shard: `datatype\0uid`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId {
    pub data_type: String,
    pub uid: RecordUid,
}

impl EventId {
    pub fn new(data_type: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            data_type: data_type.into(),
            uid: uid.into(),
        }
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\u{0}{}", self.data_type, self.uid)
    }
}

/// One raw record presented to the ingest path.
///
/// Normalization and aliasing happen upstream; by the time a record reaches
/// the key builder its fields are already canonicalized [`IndexedField`]s.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub data_type: String,
    pub uid: RecordUid,

    /// Event timestamp, epoch milliseconds
    pub date: i64,

    /// Record-level visibility, the default for fields without markings
    pub visibility: Visibility,

    /// Identity string hashed for shard placement. Usually the uid, but
    /// sources may shard on a coarser identity (e.g. a session id).
    pub sharded_identity: String,

    /// Upstream parser hit an unrecoverable problem; the record must emit
    /// zero keys, which callers treat as success
    pub fatal_error: bool,

    /// Emit every key as a delete tombstone instead of an insert
    pub delete_mode: bool,
}

impl RawRecord {
    pub fn new(data_type: impl Into<String>, uid: impl Into<String>, date: i64) -> Self {
        let uid = uid.into();
        Self {
            data_type: data_type.into(),
            sharded_identity: uid.clone(),
            uid,
            date,
            visibility: Visibility::empty(),
            fatal_error: false,
            delete_mode: false,
        }
    }

    pub fn event_id(&self) -> EventId {
        EventId::new(self.data_type.clone(), self.uid.clone())
    }

    /// Stable non-negative hash of the sharded identity.
    ///
    /// The masking mirrors the usual `MAX & hashCode` idiom so that the
    /// modulo in shard placement never sees a negative value.
    pub fn identity_hash(&self) -> u32 {
        let mut hash: i32 = 0;
        for b in self.sharded_identity.bytes() {
            hash = hash.wrapping_mul(31).wrapping_add(b as i32);
        }
        (hash & i32::MAX) as u32
    }
}

/// Truncate an epoch-millis timestamp to the start of its UTC day.
pub fn truncate_to_day(ts_millis: i64) -> i64 {
    ts_millis.div_euclid(MS_PER_DAY) * MS_PER_DAY
}

/// Calendar date of an epoch-millis timestamp, UTC.
pub fn date_of_millis(ts_millis: i64) -> NaiveDate {
    let dt: DateTime<Utc> = Utc
        .timestamp_millis_opt(ts_millis)
        .single()
        .unwrap_or_else(|| Utc.timestamp_millis_opt(0).unwrap());
    dt.date_naive()
}

/// `yyyyMMdd` rendering used as the shard id date prefix.
pub fn format_shard_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_to_day() {
        // 2024-03-15T13:45:00Z
        let ts = 1_710_510_300_000;
        let day = truncate_to_day(ts);
        assert_eq!(day % MS_PER_DAY, 0);
        assert!(day <= ts && ts - day < MS_PER_DAY);
        // negative timestamps floor toward the earlier day
        assert_eq!(truncate_to_day(-1), -MS_PER_DAY);
    }

    #[test]
    fn test_format_shard_date() {
        let date = date_of_millis(1_710_510_300_000);
        assert_eq!(format_shard_date(date), "20240315");
    }

    #[test]
    fn test_identity_hash_is_stable_and_non_negative() {
        let a = RawRecord::new("wiki", "rec-001", 0);
        let b = RawRecord::new("wiki", "rec-001", 12345);
        assert_eq!(a.identity_hash(), b.identity_hash());
    }

    #[test]
    fn test_event_id_display() {
        let id = EventId::new("wiki", "abc.123");
        assert_eq!(id.to_string(), "wiki\u{0}abc.123");
    }
}
