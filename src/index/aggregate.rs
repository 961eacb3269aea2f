//! Global-index value: a bounded uid aggregate
//!
//! Each global-index cell aggregates "which records in this shard carry
//! this field value". While cardinality is low the uids are enumerated so
//! queries can jump straight to documents; past the cap the aggregate
//! degrades to a count, which still answers "which shards" and "roughly
//! how many". Merging is associative and commutative because the backing
//! store combines cell versions in arbitrary order.

use crate::error::Result;
use crate::types::RecordUid;
use serde::{Deserialize, Serialize};

/// Enumerated uids are abandoned once a merged aggregate would exceed this
/// many entries. The count stays exact; only the enumeration is dropped.
pub const MAX_ENUMERATED_UIDS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UidAggregate {
    /// Exact count plus the uid enumeration. The count can exceed the list
    /// length after a union dedups shared uids.
    Enumerated { count: i64, uids: Vec<RecordUid> },

    /// Cardinality hint only; enumeration was dropped at the cap.
    CountOnly(i64),
}

impl UidAggregate {
    /// Aggregate for a single record occurrence.
    pub fn single(uid: impl Into<RecordUid>) -> Self {
        UidAggregate::Enumerated {
            count: 1,
            uids: vec![uid.into()],
        }
    }

    pub fn count(&self) -> i64 {
        match self {
            UidAggregate::Enumerated { count, .. } => *count,
            UidAggregate::CountOnly(count) => *count,
        }
    }

    pub fn uids(&self) -> Option<&[RecordUid]> {
        match self {
            UidAggregate::Enumerated { uids, .. } => Some(uids),
            UidAggregate::CountOnly(_) => None,
        }
    }

    pub fn is_count_only(&self) -> bool {
        matches!(self, UidAggregate::CountOnly(_))
    }

    /// Merge two aggregates: counts sum, uid lists union, and the result
    /// collapses to count-only once the union exceeds
    /// [`MAX_ENUMERATED_UIDS`].
    pub fn merge(self, other: UidAggregate) -> UidAggregate {
        let total = self.count() + other.count();
        match (self, other) {
            (
                UidAggregate::Enumerated { uids: mut left, .. },
                UidAggregate::Enumerated { uids: right, .. },
            ) => {
                left.extend(right);
                left.sort_unstable();
                left.dedup();
                if left.len() > MAX_ENUMERATED_UIDS {
                    UidAggregate::CountOnly(total)
                } else {
                    UidAggregate::Enumerated {
                        count: total,
                        uids: left,
                    }
                }
            }
            _ => UidAggregate::CountOnly(total),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(buf)?)
    }

    /// Store-side combiner over encoded aggregates, usable as a
    /// [`MemoryStore`](crate::store::MemoryStore) table combiner.
    pub fn combine_encoded(existing: &[u8], incoming: &[u8]) -> Result<Vec<u8>> {
        let merged = UidAggregate::decode(existing)?.merge(UidAggregate::decode(incoming)?);
        merged.encode()
    }
}
