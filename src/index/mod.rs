//! Ingest-side index construction
//!
//! [`IndexKeyBuilder`] turns one normalized record into the full set of
//! event, field-index, global/reverse-index, dictionary and term-frequency
//! key/value pairs. Supporting pieces: the global-index
//! [`UidAggregate`] value, the dictionary dedup cache, and the per-record
//! bloom dedup filter.

mod aggregate;
mod bloom_dedup;
mod builder;
mod dictionary;

pub use aggregate::{UidAggregate, MAX_ENUMERATED_UIDS};
pub use bloom_dedup::{BloomDedupFilter, ResourceMonitor, SystemResourceMonitor};
pub use builder::IndexKeyBuilder;
pub use dictionary::DictionaryDedupCache;
