//! Bounded term-offset cache with eviction-as-flush
//!
//! Batches term positions per (term, zone) so one term-frequency row can
//! carry all of a term's positions for a record. The cache is bounded by
//! total buffered positions; overflowing evicts the least-recently-touched
//! entry *as output*: every eviction becomes a store write, which is why
//! this is an explicit arena with an intrusive LRU list rather than a
//! cache-library wrapper. Readers must merge rows because a term can flush
//! more than once for one record.

use crate::keys::{TermOffset, TermOffsets};
use ahash::AHashMap;

/// Cache key: one term in one zone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermAndZone {
    pub term: String,
    pub zone: String,
}

impl TermAndZone {
    pub fn new(term: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            zone: zone.into(),
        }
    }
}

/// A completed entry on its way to a term-frequency row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushedEntry {
    pub key: TermAndZone,
    pub offsets: TermOffsets,
}

const NIL: usize = usize::MAX;

struct Slot {
    key: TermAndZone,
    offsets: TermOffsets,
    prev: usize,
    next: usize,
}

/// Arena-backed LRU of term offsets, bounded by buffered position count.
pub struct BoundedOffsetCache {
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
    index: AHashMap<TermAndZone, usize>,
    head: usize,
    tail: usize,
    buffered: usize,
    capacity: usize,
}

impl BoundedOffsetCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            index: AHashMap::new(),
            head: NIL,
            tail: NIL,
            buffered: 0,
            capacity,
        }
    }

    /// Total positions currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffered
    }

    /// Distinct (term, zone) entries currently cached.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Record one position. Returns any entries flushed by overflow.
    pub fn add_offset(&mut self, key: TermAndZone, offset: TermOffset) -> Vec<FlushedEntry> {
        if let Some(&slot_index) = self.index.get(&key) {
            self.slots[slot_index]
                .as_mut()
                .expect("indexed slot occupied")
                .offsets
                .push(offset);
            self.touch(slot_index);
        } else {
            let mut offsets = TermOffsets::new();
            offsets.push(offset);
            let slot_index = self.allocate(Slot {
                key: key.clone(),
                offsets,
                prev: NIL,
                next: NIL,
            });
            self.index.insert(key, slot_index);
            self.push_front(slot_index);
        }
        self.buffered += 1;

        let mut flushed = Vec::new();
        while self.buffered > self.capacity {
            match self.evict_tail() {
                Some(entry) => flushed.push(entry),
                None => break,
            }
        }
        flushed
    }

    /// Flush every remaining entry, in (zone, term) order for deterministic
    /// output. Called at end of record.
    pub fn drain(&mut self) -> Vec<FlushedEntry> {
        let mut entries: Vec<FlushedEntry> = self
            .index
            .values()
            .map(|&slot_index| {
                let slot = self.slots[slot_index].as_ref().expect("indexed slot occupied");
                FlushedEntry {
                    key: slot.key.clone(),
                    offsets: slot.offsets.clone(),
                }
            })
            .collect();
        entries.sort_by(|a, b| {
            (&a.key.zone, &a.key.term).cmp(&(&b.key.zone, &b.key.term))
        });

        self.slots.clear();
        self.free.clear();
        self.index.clear();
        self.head = NIL;
        self.tail = NIL;
        self.buffered = 0;
        entries
    }

    fn allocate(&mut self, slot: Slot) -> usize {
        if let Some(slot_index) = self.free.pop() {
            self.slots[slot_index] = Some(slot);
            slot_index
        } else {
            self.slots.push(Some(slot));
            self.slots.len() - 1
        }
    }

    fn touch(&mut self, slot_index: usize) {
        self.unlink(slot_index);
        self.push_front(slot_index);
    }

    fn push_front(&mut self, slot_index: usize) {
        {
            let slot = self.slots[slot_index].as_mut().expect("slot occupied");
            slot.prev = NIL;
            slot.next = self.head;
        }
        if self.head != NIL {
            self.slots[self.head].as_mut().expect("head occupied").prev = slot_index;
        }
        self.head = slot_index;
        if self.tail == NIL {
            self.tail = slot_index;
        }
    }

    fn unlink(&mut self, slot_index: usize) {
        let (prev, next) = {
            let slot = self.slots[slot_index].as_ref().expect("slot occupied");
            (slot.prev, slot.next)
        };
        match prev {
            NIL => self.head = next,
            p => self.slots[p].as_mut().expect("prev occupied").next = next,
        }
        match next {
            NIL => self.tail = prev,
            n => self.slots[n].as_mut().expect("next occupied").prev = prev,
        }
    }

    fn evict_tail(&mut self) -> Option<FlushedEntry> {
        let slot_index = self.tail;
        if slot_index == NIL {
            return None;
        }
        self.unlink(slot_index);
        let slot = self.slots[slot_index].take().expect("tail occupied");
        self.free.push(slot_index);
        self.index.remove(&slot.key);
        self.buffered -= slot.offsets.len();
        Some(FlushedEntry {
            key: slot.key,
            offsets: slot.offsets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashMap;

    fn key(term: &str) -> TermAndZone {
        TermAndZone::new(term, "BODY_TOKEN")
    }

    #[test]
    fn test_accumulates_without_overflow() {
        let mut cache = BoundedOffsetCache::new(100);
        assert!(cache.add_offset(key("quick"), TermOffset::at(1)).is_empty());
        assert!(cache.add_offset(key("quick"), TermOffset::at(7)).is_empty());
        assert!(cache.add_offset(key("brown"), TermOffset::at(2)).is_empty());

        let drained = cache.drain();
        assert_eq!(drained.len(), 2);
        let quick = drained.iter().find(|e| e.key.term == "quick").unwrap();
        assert_eq!(quick.offsets.len(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_overflow_evicts_least_recently_touched() {
        let mut cache = BoundedOffsetCache::new(4);
        cache.add_offset(key("a"), TermOffset::at(0));
        cache.add_offset(key("b"), TermOffset::at(1));
        cache.add_offset(key("c"), TermOffset::at(2));
        // touch "a" so "b" becomes the coldest
        cache.add_offset(key("a"), TermOffset::at(3));

        let flushed = cache.add_offset(key("d"), TermOffset::at(4));
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].key.term, "b");
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_zero_capacity_flushes_immediately() {
        let mut cache = BoundedOffsetCache::new(0);
        let flushed = cache.add_offset(key("solo"), TermOffset::at(9));
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].key.term, "solo");
        assert!(cache.is_empty());
        assert_eq!(cache.buffered(), 0);
    }

    #[test]
    fn test_completeness_under_overflow() {
        // union of overflow flushes and the final drain must equal the
        // exact positions fed in: no duplicates, no gaps
        let mut cache = BoundedOffsetCache::new(8);
        let mut expected: AHashMap<TermAndZone, Vec<u32>> = AHashMap::new();
        let mut collected: AHashMap<TermAndZone, Vec<u32>> = AHashMap::new();

        let terms = ["t0", "t1", "t2", "t3", "t4"];
        for position in 0u32..200 {
            let k = key(terms[(position % 5) as usize]);
            expected.entry(k.clone()).or_default().push(position);
            for entry in cache.add_offset(k, TermOffset::at(position)) {
                collected
                    .entry(entry.key)
                    .or_default()
                    .extend(entry.offsets.positions().iter().map(|p| p.offset));
            }
        }
        for entry in cache.drain() {
            collected
                .entry(entry.key)
                .or_default()
                .extend(entry.offsets.positions().iter().map(|p| p.offset));
        }

        for (k, mut offsets) in collected {
            offsets.sort_unstable();
            assert_eq!(offsets, expected.remove(&k).unwrap());
        }
        assert!(expected.is_empty());
    }
}
