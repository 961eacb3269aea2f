//! In-memory sorted store for tests and single-process tools
//!
//! One BTreeMap per table, keyed by the full [`StoreKey`] order. Tables may
//! register a combiner that merges colliding values on write, standing in
//! for the server-side aggregation a production store applies to global
//! index entries.

use super::{KeyRange, SortedStore, StoreKey, TableKey, TableWriter};
use crate::Result;
use ahash::AHashMap;
use std::collections::BTreeMap;

type Combiner = fn(&[u8], &[u8]) -> Result<Vec<u8>>;

#[derive(Default)]
pub struct MemoryStore {
    tables: AHashMap<String, BTreeMap<StoreKey, Vec<u8>>>,
    combiners: AHashMap<String, Combiner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge colliding writes to `table` through `combiner` instead of
    /// replacing, the way the backing store aggregates index values.
    pub fn register_combiner(&mut self, table: impl Into<String>, combiner: Combiner) {
        self.combiners.insert(table.into(), combiner);
    }

    /// Read-only scan view over one table.
    pub fn view(&self, table: &str) -> MemoryTableView<'_> {
        MemoryTableView {
            entries: self.tables.get(table),
        }
    }

    pub fn len(&self, table: &str) -> usize {
        self.tables.get(table).map(BTreeMap::len).unwrap_or(0)
    }

    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }

    /// All entries of a table in key order, for assertions.
    pub fn dump(&self, table: &str) -> Vec<(StoreKey, Vec<u8>)> {
        self.tables
            .get(table)
            .map(|t| t.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    pub fn get(&self, table: &str, key: &StoreKey) -> Option<&[u8]> {
        self.tables.get(table)?.get(key).map(Vec::as_slice)
    }
}

impl TableWriter for MemoryStore {
    fn write(&mut self, batch: Vec<(TableKey, Vec<u8>)>) -> Result<()> {
        for (table_key, value) in batch {
            let combiner = self.combiners.get(&table_key.table).copied();
            let entries = self.tables.entry(table_key.table).or_default();
            match (combiner, entries.get(&table_key.key)) {
                (Some(combine), Some(existing)) => {
                    let merged = combine(existing, &value)?;
                    entries.insert(table_key.key, merged);
                }
                _ => {
                    entries.insert(table_key.key, value);
                }
            }
        }
        Ok(())
    }
}

/// Borrowed scan view over one table of a [`MemoryStore`].
pub struct MemoryTableView<'a> {
    entries: Option<&'a BTreeMap<StoreKey, Vec<u8>>>,
}

impl SortedStore for MemoryTableView<'_> {
    fn seek(
        &self,
        range: &KeyRange,
        family_filter: &[Vec<u8>],
    ) -> Result<Box<dyn Iterator<Item = (StoreKey, Vec<u8>)> + '_>> {
        let Some(entries) = self.entries else {
            return Ok(Box::new(std::iter::empty()));
        };
        let range = range.clone();
        let families: Vec<Vec<u8>> = family_filter.to_vec();
        let iter = entries
            .iter()
            .filter(move |(key, _)| range.contains(&key.position()))
            .filter(move |(key, _)| families.is_empty() || families.contains(&key.family))
            .map(|(key, value)| (key.clone(), value.clone()));
        Ok(Box::new(iter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Visibility;

    fn entry(row: &str, family: &str, qualifier: &str) -> (TableKey, Vec<u8>) {
        let key = StoreKey::new(row, family, qualifier, Visibility::empty(), 0, false);
        (TableKey::new("t", key), b"v".to_vec())
    }

    #[test]
    fn test_write_and_scan() {
        let mut store = MemoryStore::new();
        store
            .write(vec![
                entry("row1", "fi\u{0}NAME", "a"),
                entry("row1", "fi\u{0}NAME", "b"),
                entry("row1", "tf", "c"),
                entry("row2", "fi\u{0}NAME", "d"),
            ])
            .unwrap();

        let view = store.view("t");
        let range = KeyRange::half_open(
            (b"row1".to_vec(), vec![], vec![]),
            (b"row2".to_vec(), vec![], vec![]),
        );
        let all: Vec<_> = view.seek(&range, &[]).unwrap().collect();
        assert_eq!(all.len(), 3);

        let filtered: Vec<_> = view
            .seek(&range, &[b"fi\x00NAME".to_vec()])
            .unwrap()
            .collect();
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn test_missing_table_scans_empty() {
        let store = MemoryStore::new();
        let view = store.view("nope");
        let range = KeyRange::half_open((vec![], vec![], vec![]), (b"z".to_vec(), vec![], vec![]));
        assert_eq!(view.seek(&range, &[]).unwrap().count(), 0);
    }

    #[test]
    fn test_combiner_merges_collisions() {
        fn concat(a: &[u8], b: &[u8]) -> Result<Vec<u8>> {
            let mut merged = a.to_vec();
            merged.extend_from_slice(b);
            Ok(merged)
        }

        let mut store = MemoryStore::new();
        store.register_combiner("t", concat);
        let (key, _) = entry("r", "f", "q");
        store.write(vec![(key.clone(), b"x".to_vec())]).unwrap();
        store.write(vec![(key.clone(), b"y".to_vec())]).unwrap();
        assert_eq!(store.get("t", &key.key), Some(&b"xy"[..]));
    }
}
