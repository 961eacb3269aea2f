//! Deterministic shard-id assignment

use crate::error::{IndexError, Result};
use crate::types::{date_of_millis, format_shard_date, RawRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered date → shard-count table with a guaranteed default.
///
/// `num_shards` is a floor lookup: a date resolves to the count configured
/// at the latest override on or before it, falling back to the default for
/// dates before every override. The default plays the role of the
/// `-infinity` entry, so every date resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardTable {
    default_count: u32,
    overrides: BTreeMap<NaiveDate, u32>,
}

impl ShardTable {
    pub fn new(default_count: u32) -> Result<Self> {
        if default_count == 0 {
            return Err(IndexError::Config("shard count must be non-zero".into()));
        }
        Ok(Self {
            default_count,
            overrides: BTreeMap::new(),
        })
    }

    pub fn with_overrides(
        default_count: u32,
        overrides: impl IntoIterator<Item = (NaiveDate, u32)>,
    ) -> Result<Self> {
        let mut table = Self::new(default_count)?;
        for (date, count) in overrides {
            table.set_override(date, count)?;
        }
        Ok(table)
    }

    pub fn set_override(&mut self, date: NaiveDate, count: u32) -> Result<()> {
        if count == 0 {
            return Err(IndexError::Config(format!(
                "shard count override for {date} must be non-zero"
            )));
        }
        self.overrides.insert(date, count);
        Ok(())
    }

    /// Shard count effective on `date` (floor lookup, total).
    pub fn num_shards(&self, date: NaiveDate) -> u32 {
        self.overrides
            .range(..=date)
            .next_back()
            .map(|(_, &count)| count)
            .unwrap_or(self.default_count)
    }

    pub fn default_count(&self) -> u32 {
        self.default_count
    }

    pub fn overrides(&self) -> impl Iterator<Item = (NaiveDate, u32)> + '_ {
        self.overrides.iter().map(|(&d, &c)| (d, c))
    }
}

/// Maps records to shard ids through a [`ShardTable`].
#[derive(Debug, Clone)]
pub struct ShardAssigner {
    table: ShardTable,
}

impl ShardAssigner {
    pub fn new(table: ShardTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &ShardTable {
        &self.table
    }

    /// Shard id for a (date, identity-hash) pair: `yyyyMMdd_n`.
    pub fn shard_id(&self, date: NaiveDate, identity_hash: u32) -> String {
        let bucket = identity_hash % self.table.num_shards(date);
        format!("{}_{}", format_shard_date(date), bucket)
    }

    /// Shard id for a record's event date and sharded identity.
    pub fn shard_id_for(&self, record: &RawRecord) -> String {
        self.shard_id(date_of_millis(record.date), record.identity_hash())
    }

    pub fn num_shards(&self, date: NaiveDate) -> u32 {
        self.table.num_shards(date)
    }

    /// Bucket component of a shard id.
    pub fn shard_of(shard_id: &str) -> Result<u32> {
        let (_, bucket) = shard_id
            .split_once('_')
            .ok_or_else(|| IndexError::InvalidData(format!("malformed shard id: {shard_id}")))?;
        bucket
            .parse()
            .map_err(|_| IndexError::InvalidData(format!("malformed shard bucket: {shard_id}")))
    }

    /// Date prefix component of a shard id.
    pub fn date_of(shard_id: &str) -> Result<&str> {
        let (date, _) = shard_id
            .split_once('_')
            .ok_or_else(|| IndexError::InvalidData(format!("malformed shard id: {shard_id}")))?;
        Ok(date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_floor_lookup_with_default() {
        let table = ShardTable::with_overrides(
            11,
            [(date(2024, 1, 1), 17), (date(2024, 6, 1), 31)],
        )
        .unwrap();
        assert_eq!(table.num_shards(date(2023, 12, 31)), 11);
        assert_eq!(table.num_shards(date(2024, 1, 1)), 17);
        assert_eq!(table.num_shards(date(2024, 5, 31)), 17);
        assert_eq!(table.num_shards(date(2024, 6, 1)), 31);
        assert_eq!(table.num_shards(date(2030, 1, 1)), 31);
    }

    #[test]
    fn test_zero_shard_count_rejected() {
        assert!(ShardTable::new(0).is_err());
        let mut table = ShardTable::new(4).unwrap();
        assert!(table.set_override(date(2024, 1, 1), 0).is_err());
    }

    #[test]
    fn test_shard_id_determinism_and_round_trip() {
        let assigner = ShardAssigner::new(ShardTable::new(7).unwrap());
        let record = RawRecord::new("wiki", "rec-42", 1_710_510_300_000);

        let first = assigner.shard_id_for(&record);
        let second = assigner.shard_id_for(&record);
        assert_eq!(first, second);

        let event_date = date_of_millis(record.date);
        assert_eq!(ShardAssigner::date_of(&first).unwrap(), format_shard_date(event_date));
        assert_eq!(
            ShardAssigner::shard_of(&first).unwrap(),
            record.identity_hash() % assigner.num_shards(event_date)
        );
    }

    #[test]
    fn test_malformed_shard_id_rejected() {
        assert!(ShardAssigner::shard_of("20240101").is_err());
        assert!(ShardAssigner::shard_of("20240101_x").is_err());
    }
}
