//! Shardindex: a sharded positional inverted index engine
//!
//! Builds and queries a day-partitioned, positional inverted index over
//! semi-structured records stored in an ordered key-value store.
//!
//! ## Architecture
//! - Shard layer: deterministic `yyyyMMdd_n` shard assignment with a
//!   per-date shard-count table distributed as a cached artifact
//! - Ingest layer: [`index::IndexKeyBuilder`] emits event, field-index,
//!   global/reverse-index, dictionary and term-frequency keys per record,
//!   fed by the content tokenizer and its bounded offset cache
//! - Query layer: [`query::PhraseProximityEvaluator`] confirms `within`,
//!   `adjacent` and `phrase` predicates against candidate documents,
//!   resolving negated terms through on-demand field-index seeks
//! - Storage boundary: [`store::SortedStore`] / [`store::TableWriter`]
//!   traits; the key layout in [`keys`] is the byte-exact contract between
//!   writer and reader

pub mod config;
pub mod index;
pub mod keys;
pub mod query;
pub mod shard;
pub mod store;
pub mod tokenize;
pub mod types;

mod error;

pub use config::IndexConfig;
pub use error::{IndexError, Result};
pub use index::{IndexKeyBuilder, UidAggregate};
pub use query::{PhraseProximityEvaluator, ProximityFunction};
pub use shard::{ShardAssigner, ShardTable};
