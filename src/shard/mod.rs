//! Shard assignment: day-partitioned, hash-bucketed shard ids
//!
//! A shard id is `yyyyMMdd_n` where `n` is the record's identity hash
//! modulo the shard count configured for that calendar day. Writers and
//! readers must resolve the same shard-count table for a date or range
//! scans will miss shards; the table is therefore distributed as a cached
//! artifact with an explicit freshness window (see [`ShardTableCache`]).

mod assigner;
mod table_cache;

pub use assigner::{ShardAssigner, ShardTable};
pub use table_cache::{ShardCountSource, ShardTableCache, ShardTableHandle};
