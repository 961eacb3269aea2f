//! Term-offset reconstruction from the term-frequency index
//!
//! For one confirmed event, fetch the term-frequency rows covering a set
//! of (field, value) pairs and rebuild each pair's ordered offset list.
//! One seek spans the whole sorted search space; rows outside it are
//! filtered out. A (field, value) pair can surface in several rows when
//! the ingest offset cache overflowed, so rows merge into one list.
//! Malformed payloads are logged and skipped, never fatal.

use crate::error::Result;
use crate::keys::{self, TermOffsets};
use crate::store::{KeyRange, SortedStore};
use crate::types::EventId;
use ahash::AHashMap;
use std::collections::BTreeSet;
use tracing::warn;

/// Decoded offsets per (field, value), for one event.
#[derive(Debug, Default)]
pub struct TermOffsetMap {
    entries: AHashMap<(String, String), TermOffsets>,
}

impl TermOffsetMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a row's offsets into the (field, value) entry.
    pub fn add(&mut self, field: impl Into<String>, value: impl Into<String>, offsets: TermOffsets) {
        let entry = self
            .entries
            .entry((field.into(), value.into()))
            .or_default();
        if entry.is_empty() {
            *entry = offsets;
        } else {
            entry.merge(&offsets);
        }
    }

    pub fn get(&self, field: &str, value: &str) -> Option<&TermOffsets> {
        self.entries
            .get(&(field.to_string(), value.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fetch and decode the term-frequency rows for `field_values` of one
/// event in one shard.
pub fn populate_term_offsets(
    store: &dyn SortedStore,
    shard_id: &str,
    event: &EventId,
    field_values: &[(String, String)],
) -> Result<TermOffsetMap> {
    let mut map = TermOffsetMap::new();
    if field_values.is_empty() {
        return Ok(map);
    }

    // sorted search space of fully-qualified tf qualifiers
    let search_space: BTreeSet<Vec<u8>> = field_values
        .iter()
        .map(|(field, value)| {
            keys::term_frequency_qualifier(&event.data_type, &event.uid, value, field)
        })
        .collect();

    let first = search_space.iter().next().expect("non-empty").clone();
    let last = search_space.iter().next_back().expect("non-empty").clone();
    let range = KeyRange::closed(
        (shard_id.as_bytes().to_vec(), keys::TERM_FREQUENCY_FAMILY.to_vec(), first),
        (shard_id.as_bytes().to_vec(), keys::TERM_FREQUENCY_FAMILY.to_vec(), last),
    );

    for (key, value) in store.seek(&range, &[keys::TERM_FREQUENCY_FAMILY.to_vec()])? {
        if !search_space.contains(&key.qualifier) {
            continue;
        }
        let (_, _, term, field) = match keys::parse_term_frequency_qualifier(&key.qualifier) {
            Ok(parts) => parts,
            Err(err) => {
                warn!(%err, "malformed term-frequency qualifier, skipping row");
                continue;
            }
        };
        match TermOffsets::decode(&value) {
            Ok(offsets) => map.add(field, term, offsets),
            Err(err) => {
                warn!(%err, %field, %term, "malformed term-frequency payload, skipping row");
            }
        }
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreKey, TableKey, TableWriter};
    use crate::types::Visibility;

    fn tf_row(shard: &str, event: &EventId, value: &str, field: &str, offsets: &[u32]) -> (TableKey, Vec<u8>) {
        let key = StoreKey::new(
            shard,
            keys::TERM_FREQUENCY_FAMILY,
            keys::term_frequency_qualifier(&event.data_type, &event.uid, value, field),
            Visibility::empty(),
            0,
            false,
        );
        (
            TableKey::new("shard", key),
            TermOffsets::from_offsets(offsets.iter().copied()).encode(),
        )
    }

    fn field_values(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(f, v)| (f.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_populate_filters_to_search_space() {
        let event = EventId::new("wiki", "a1");
        let mut store = MemoryStore::new();
        store
            .write(vec![
                tf_row("s_0", &event, "quick", "BODY_TOKEN", &[1, 9]),
                tf_row("s_0", &event, "other", "BODY_TOKEN", &[4]),
                tf_row("s_0", &event, "quick", "TITLE_TOKEN", &[0]),
            ])
            .unwrap();

        let map = populate_term_offsets(
            &store.view("shard"),
            "s_0",
            &event,
            &field_values(&[("BODY_TOKEN", "quick")]),
        )
        .unwrap();
        assert_eq!(map.len(), 1);
        let offsets = map.get("BODY_TOKEN", "quick").unwrap();
        let positions: Vec<u32> = offsets.positions().iter().map(|p| p.offset).collect();
        assert_eq!(positions, vec![1, 9]);
    }

    #[test]
    fn test_populate_merges_overflow_rows() {
        // two rows for the same (field, value): distinct visibilities keep
        // both store entries alive, as an ingest overflow flush would
        let event = EventId::new("wiki", "a1");
        let mut store = MemoryStore::new();
        let (first_key, first_value) = tf_row("s_0", &event, "quick", "BODY_TOKEN", &[7, 9]);
        let mut second_key = first_key.clone();
        second_key.key.visibility = Visibility::from("X");
        store
            .write(vec![
                (first_key, first_value),
                (
                    second_key,
                    TermOffsets::from_offsets([1, 3]).encode(),
                ),
            ])
            .unwrap();

        let map = populate_term_offsets(
            &store.view("shard"),
            "s_0",
            &event,
            &field_values(&[("BODY_TOKEN", "quick")]),
        )
        .unwrap();
        let positions: Vec<u32> = map
            .get("BODY_TOKEN", "quick")
            .unwrap()
            .positions()
            .iter()
            .map(|p| p.offset)
            .collect();
        assert_eq!(positions, vec![1, 3, 7, 9]);
    }

    #[test]
    fn test_malformed_payload_skipped() {
        let event = EventId::new("wiki", "a1");
        let mut store = MemoryStore::new();
        let (good_key, good_value) = tf_row("s_0", &event, "quick", "BODY_TOKEN", &[2]);
        let bad_key = StoreKey::new(
            "s_0",
            keys::TERM_FREQUENCY_FAMILY,
            keys::term_frequency_qualifier("wiki", "a1", "brown", "BODY_TOKEN"),
            Visibility::empty(),
            0,
            false,
        );
        store
            .write(vec![
                (good_key, good_value),
                (TableKey::new("shard", bad_key), vec![0x80]),
            ])
            .unwrap();

        let map = populate_term_offsets(
            &store.view("shard"),
            "s_0",
            &event,
            &field_values(&[("BODY_TOKEN", "quick"), ("BODY_TOKEN", "brown")]),
        )
        .unwrap();
        // the bad row is skipped, the good one survives
        assert!(map.get("BODY_TOKEN", "brown").is_none());
        assert!(map.get("BODY_TOKEN", "quick").is_some());
    }

    #[test]
    fn test_other_events_excluded() {
        let event = EventId::new("wiki", "a1");
        let other = EventId::new("wiki", "a2");
        let mut store = MemoryStore::new();
        store
            .write(vec![tf_row("s_0", &other, "quick", "BODY_TOKEN", &[5])])
            .unwrap();

        let map = populate_term_offsets(
            &store.view("shard"),
            "s_0",
            &event,
            &field_values(&[("BODY_TOKEN", "quick")]),
        )
        .unwrap();
        assert!(map.is_empty());
    }
}
