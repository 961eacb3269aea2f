//! Dictionary dedup cache
//!
//! The term dictionary table gets one forward and one reversed entry per
//! distinct (field, value, visibility) combination; within one shard the
//! same combination repeats constantly, so a small bounded LRU suppresses
//! re-emission. Suppression is best-effort: an evicted combination simply
//! emits again, and the store collapses the duplicate versions.

use crate::types::Visibility;
use lru::LruCache;
use std::num::NonZeroUsize;

/// Cache key: one dictionary entry identity.
type DictionaryKey = (String, String, Visibility);

pub struct DictionaryDedupCache {
    cache: LruCache<DictionaryKey, ()>,
}

impl DictionaryDedupCache {
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).expect("max(1) is non-zero");
        Self {
            cache: LruCache::new(capacity),
        }
    }

    /// True when this combination has not been seen recently; records it
    /// either way.
    pub fn first_sighting(&mut self, field: &str, value: &str, visibility: &Visibility) -> bool {
        let key = (field.to_string(), value.to_string(), visibility.clone());
        self.cache.put(key, ()).is_none()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
