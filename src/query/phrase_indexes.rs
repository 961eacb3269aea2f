//! Confirmed phrase hit ranges
//!
//! Per query evaluation, each field accumulates `(event id, start, end)`
//! triplets identifying where a phrase or proximity predicate matched.
//! Overlapping or touching triplets for the same event merge into their
//! union on insert, so downstream excerpt extraction never sees two
//! fragments of one hit.

use crate::types::EventId;
use ahash::AHashMap;

#[derive(Debug, Clone, Default)]
pub struct PhraseIndexes {
    map: AHashMap<String, Vec<(EventId, u32, u32)>>,
}

impl PhraseIndexes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a triplet, merging with any overlapping or touching triplet
    /// already present for the same field and event.
    pub fn add_triplet(&mut self, field: impl Into<String>, event_id: EventId, start: u32, end: u32) {
        let (mut start, mut end) = if start <= end { (start, end) } else { (end, start) };
        let triplets = self.map.entry(field.into()).or_default();

        // pull out everything the new range coalesces with
        let mut keep = Vec::with_capacity(triplets.len() + 1);
        for (existing_event, existing_start, existing_end) in triplets.drain(..) {
            let coalesces = existing_event == event_id
                && start <= existing_end.saturating_add(1)
                && existing_start <= end.saturating_add(1);
            if coalesces {
                start = start.min(existing_start);
                end = end.max(existing_end);
            } else {
                keep.push((existing_event, existing_start, existing_end));
            }
        }
        keep.push((event_id, start, end));
        keep.sort_by(|a, b| (&a.0, a.1, a.2).cmp(&(&b.0, b.1, b.2)));
        *triplets = keep;
    }

    pub fn triplets(&self, field: &str) -> &[(EventId, u32, u32)] {
        self.map.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.map.values().all(Vec::is_empty)
    }

    pub fn len(&self) -> usize {
        self.map.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(uid: &str) -> EventId {
        EventId::new("wiki", uid)
    }

    #[test]
    fn test_overlap_merge() {
        let mut indexes = PhraseIndexes::new();
        indexes.add_triplet("BODY", event("e"), 1, 3);
        indexes.add_triplet("BODY", event("e"), 2, 5);
        assert_eq!(indexes.triplets("BODY"), &[(event("e"), 1, 5)]);
    }

    #[test]
    fn test_touching_ranges_merge() {
        let mut indexes = PhraseIndexes::new();
        indexes.add_triplet("BODY", event("e"), 1, 3);
        indexes.add_triplet("BODY", event("e"), 4, 6);
        assert_eq!(indexes.triplets("BODY"), &[(event("e"), 1, 6)]);
    }

    #[test]
    fn test_disjoint_ranges_stay_separate() {
        let mut indexes = PhraseIndexes::new();
        indexes.add_triplet("BODY", event("e"), 1, 2);
        indexes.add_triplet("BODY", event("e"), 8, 9);
        assert_eq!(indexes.triplets("BODY"), &[(event("e"), 1, 2), (event("e"), 8, 9)]);
    }

    #[test]
    fn test_chained_merge_collapses_all() {
        let mut indexes = PhraseIndexes::new();
        indexes.add_triplet("BODY", event("e"), 1, 2);
        indexes.add_triplet("BODY", event("e"), 8, 9);
        // bridges both existing ranges into one
        indexes.add_triplet("BODY", event("e"), 3, 7);
        assert_eq!(indexes.triplets("BODY"), &[(event("e"), 1, 9)]);
    }

    #[test]
    fn test_events_do_not_merge_across() {
        let mut indexes = PhraseIndexes::new();
        indexes.add_triplet("BODY", event("e1"), 1, 3);
        indexes.add_triplet("BODY", event("e2"), 2, 5);
        assert_eq!(indexes.triplets("BODY").len(), 2);
    }

    #[test]
    fn test_fields_do_not_merge_across() {
        let mut indexes = PhraseIndexes::new();
        indexes.add_triplet("BODY", event("e"), 1, 3);
        indexes.add_triplet("TITLE", event("e"), 2, 5);
        assert_eq!(indexes.triplets("BODY"), &[(event("e"), 1, 3)]);
        assert_eq!(indexes.triplets("TITLE"), &[(event("e"), 2, 5)]);
        assert_eq!(indexes.len(), 2);
    }
}
