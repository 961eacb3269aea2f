//! Storage boundary: ordered key-value store traits and the in-memory
//! implementation used by tests
//!
//! The engine owns exact key layout; the store owns ordering, range scans
//! and visibility evaluation. Real deployments back these traits with a
//! distributed sorted store; everything in this crate only assumes:
//! - lexicographic iteration over (row, family, qualifier)
//! - column-family filtering pushed into the scan
//! - batched writes tagged with a destination table name

mod memory;

pub use memory::{MemoryStore, MemoryTableView};

use crate::types::Visibility;
use crate::Result;
use std::cmp::Ordering;

/// One fully-qualified store key.
///
/// Ordering follows the backing store: ascending over row, family,
/// qualifier and visibility, then *descending* timestamp so the newest
/// version of a cell iterates first, with delete tombstones ahead of
/// inserts at the same position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct StoreKey {
    pub row: Vec<u8>,
    pub family: Vec<u8>,
    pub qualifier: Vec<u8>,
    pub visibility: Visibility,
    pub timestamp: i64,
    pub deleted: bool,
}

impl StoreKey {
    pub fn new(
        row: impl Into<Vec<u8>>,
        family: impl Into<Vec<u8>>,
        qualifier: impl Into<Vec<u8>>,
        visibility: Visibility,
        timestamp: i64,
        deleted: bool,
    ) -> Self {
        Self {
            row: row.into(),
            family: family.into(),
            qualifier: qualifier.into(),
            visibility,
            timestamp,
            deleted,
        }
    }

    /// Scan position of this key, ignoring visibility/timestamp.
    pub fn position(&self) -> ScanKey {
        (self.row.clone(), self.family.clone(), self.qualifier.clone())
    }
}

impl Ord for StoreKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.row
            .cmp(&other.row)
            .then_with(|| self.family.cmp(&other.family))
            .then_with(|| self.qualifier.cmp(&other.qualifier))
            .then_with(|| self.visibility.cmp(&other.visibility))
            .then_with(|| other.timestamp.cmp(&self.timestamp))
            .then_with(|| other.deleted.cmp(&self.deleted))
    }
}

impl PartialOrd for StoreKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Scan position: (row, family, qualifier) byte triple.
pub type ScanKey = (Vec<u8>, Vec<u8>, Vec<u8>);

/// Smallest scan key strictly greater than `key`: append a zero byte to
/// the qualifier.
pub fn following_key(key: &ScanKey) -> ScanKey {
    let mut qualifier = key.2.clone();
    qualifier.push(0);
    (key.0.clone(), key.1.clone(), qualifier)
}

/// Half-open or closed range over scan positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    pub start: ScanKey,
    pub start_inclusive: bool,
    pub end: ScanKey,
    pub end_inclusive: bool,
}

impl KeyRange {
    pub fn closed(start: ScanKey, end: ScanKey) -> Self {
        Self {
            start,
            start_inclusive: true,
            end,
            end_inclusive: true,
        }
    }

    pub fn half_open(start: ScanKey, end: ScanKey) -> Self {
        Self {
            start,
            start_inclusive: true,
            end,
            end_inclusive: false,
        }
    }

    /// Single-position range covering exactly `key`.
    pub fn exact(key: ScanKey) -> Self {
        let end = following_key(&key);
        Self::half_open(key, end)
    }

    pub fn contains(&self, key: &ScanKey) -> bool {
        let after_start = match key.cmp(&self.start) {
            Ordering::Greater => true,
            Ordering::Equal => self.start_inclusive,
            Ordering::Less => false,
        };
        let before_end = match key.cmp(&self.end) {
            Ordering::Less => true,
            Ordering::Equal => self.end_inclusive,
            Ordering::Greater => false,
        };
        after_start && before_end
    }
}

/// Read side of the storage boundary: sorted range scans with optional
/// column-family filtering.
pub trait SortedStore {
    /// Iterate (key, value) pairs inside `range` in key order. An empty
    /// `family_filter` scans every family.
    fn seek(
        &self,
        range: &KeyRange,
        family_filter: &[Vec<u8>],
    ) -> Result<Box<dyn Iterator<Item = (StoreKey, Vec<u8>)> + '_>>;
}

/// A key tagged with its destination table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableKey {
    pub table: String,
    pub key: StoreKey,
}

impl TableKey {
    pub fn new(table: impl Into<String>, key: StoreKey) -> Self {
        Self {
            table: table.into(),
            key,
        }
    }
}

/// Write side of the storage boundary: batched, table-tagged writes.
pub trait TableWriter {
    fn write(&mut self, batch: Vec<(TableKey, Vec<u8>)>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(row: &str, family: &str, qualifier: &str, ts: i64) -> StoreKey {
        StoreKey::new(row, family, qualifier, Visibility::empty(), ts, false)
    }

    #[test]
    fn test_key_ordering_newest_first() {
        let older = key("r", "f", "q", 100);
        let newer = key("r", "f", "q", 200);
        assert!(newer < older);
    }

    #[test]
    fn test_key_ordering_by_position() {
        let a = key("r1", "f", "q", 0);
        let b = key("r2", "a", "a", 0);
        assert!(a < b);
        let c = key("r1", "f", "q2", 0);
        assert!(a < c);
    }

    #[test]
    fn test_range_contains() {
        let range = KeyRange::half_open(
            (b"a".to_vec(), vec![], vec![]),
            (b"b".to_vec(), vec![], vec![]),
        );
        assert!(range.contains(&(b"a".to_vec(), vec![], vec![])));
        assert!(range.contains(&(b"a".to_vec(), b"zz".to_vec(), vec![])));
        assert!(!range.contains(&(b"b".to_vec(), vec![], vec![])));
    }

    #[test]
    fn test_exact_range_covers_all_versions() {
        let range = KeyRange::exact((b"r".to_vec(), b"f".to_vec(), b"q".to_vec()));
        assert!(range.contains(&(b"r".to_vec(), b"f".to_vec(), b"q".to_vec())));
        assert!(!range.contains(&(b"r".to_vec(), b"f".to_vec(), b"q2".to_vec())));
    }
}
