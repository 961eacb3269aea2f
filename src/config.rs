//! Engine configuration
//!
//! One struct per subsystem (shard assignment, bloom dedup, tokenizer),
//! aggregated into [`IndexConfig`]. Table names are validated once at
//! builder construction: a missing event table is a fatal configuration
//! error, missing secondary tables only disable the corresponding output.

use crate::{IndexError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of entries in the dictionary dedup cache.
pub const DEFAULT_DICTIONARY_CACHE_ENTRIES: usize = 1024;

/// Destination table names for emitted key/value pairs.
///
/// The event table is mandatory. Each optional table, when `None`, simply
/// suppresses that class of output keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableNames {
    /// Sharded event table (also holds field-index and term-frequency rows)
    pub event: String,

    /// Global forward index table
    pub global_index: Option<String>,

    /// Global reverse index table
    pub global_reverse_index: Option<String>,

    /// Term dictionary table (forward + reverse labels)
    pub dictionary: Option<String>,
}

impl TableNames {
    pub fn validate(&self) -> Result<()> {
        if self.event.is_empty() {
            return Err(IndexError::Config(
                "event table name not specified; no keys can be created".into(),
            ));
        }
        Ok(())
    }
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            event: "shard".to_string(),
            global_index: Some("shardIndex".to_string()),
            global_reverse_index: Some("shardReverseIndex".to_string()),
            dictionary: Some("shardDictionary".to_string()),
        }
    }
}

/// Shard assignment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardConfig {
    /// Default shard count used for any date without an override
    pub default_num_shards: u32,

    /// How long a cache artifact stays fresh before a refresh is forced
    pub cache_timeout: Duration,

    /// Retries for the write-temp-then-rename cache update
    pub cache_update_retries: u32,
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            default_num_shards: 11,
            cache_timeout: Duration::from_secs(24 * 60 * 60),
            cache_update_retries: 3,
        }
    }
}

/// Bloom dedup filter configuration.
///
/// The filter only suppresses redundant index emission; every threshold
/// crossing degrades to always-emit rather than dropping keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BloomConfig {
    /// Master switch; disabled filters never suppress anything
    pub enabled: bool,

    /// Target false-positive rate used to size the bit array
    pub false_positive_rate: f64,

    /// Hard cap on the filter's bit array, in bytes
    pub max_filter_size_bytes: usize,

    /// Minimum fraction of free disk space under `disk_threshold_path`
    /// before the filter stops accepting entries
    pub min_disk_fraction: f64,

    /// Path probed for remaining disk space
    pub disk_threshold_path: String,

    /// Minimum fraction of free heap before the filter stops accepting
    pub min_memory_fraction: f64,

    /// Minimum fraction of the task time budget remaining before the
    /// filter stops accepting
    pub min_time_fraction: f64,

    /// Total task time budget; `None` disables the time probe
    pub task_timeout: Option<Duration>,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            false_positive_rate: 0.01,
            max_filter_size_bytes: 512 * 1024,
            min_disk_fraction: 0.0,
            disk_threshold_path: "/".to_string(),
            min_memory_fraction: 0.0,
            min_time_fraction: 0.0,
            task_timeout: None,
        }
    }
}

/// Tokenizer limits and pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizerConfig {
    /// Terms shorter than this are dropped
    pub term_length_minimum: usize,

    /// Terms longer than this are dropped unless their kind is exempt
    pub term_length_limit: usize,

    /// Terms longer than this are kept but logged
    pub term_length_warning_limit: usize,

    /// Token kinds removed wholesale before indexing
    pub term_kind_blacklist: Vec<String>,

    /// Suffix appended to a field name to form its token zone
    /// (`BODY` → `BODY_TOKEN`)
    pub token_field_suffix: String,

    /// Expand tokens into their synonym set at the same position
    pub synonym_generation: bool,

    /// Position gap inserted between repeated values of the same field
    pub inter_field_position_increment: u32,

    /// Total term positions buffered across the offset cache before
    /// least-recently-touched entries are flushed early
    pub offset_cache_max_positions: usize,

    /// Estimated elapsed tokenization time that triggers a single warning
    pub time_warn_threshold: Duration,

    /// Estimated elapsed tokenization time that aborts the record's
    /// remaining tokenization
    pub time_error_threshold: Duration,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            term_length_minimum: 1,
            term_length_limit: 200,
            term_length_warning_limit: 80,
            term_kind_blacklist: Vec::new(),
            token_field_suffix: "_TOKEN".to_string(),
            synonym_generation: false,
            inter_field_position_increment: 10,
            offset_cache_max_positions: 10_000,
            time_warn_threshold: Duration::from_secs(60),
            time_error_threshold: Duration::from_secs(600),
        }
    }
}

/// Top-level configuration for ingest and evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub tables: TableNames,
    pub shard: ShardConfig,
    pub bloom: BloomConfig,
    pub tokenizer: TokenizerConfig,

    /// Suppress event-row keys (pseudo re-index jobs that rebuild only
    /// index entries)
    pub suppress_event_keys: bool,

    /// Entries kept in the per-task dictionary dedup cache
    pub dictionary_cache_entries: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            tables: TableNames::default(),
            shard: ShardConfig::default(),
            bloom: BloomConfig::default(),
            tokenizer: TokenizerConfig::default(),
            suppress_event_keys: false,
            dictionary_cache_entries: DEFAULT_DICTIONARY_CACHE_ENTRIES,
        }
    }
}

impl IndexConfig {
    /// Small limits, bloom enabled, no time probes. Intended for tests.
    pub fn for_testing() -> Self {
        Self {
            shard: ShardConfig {
                default_num_shards: 4,
                cache_timeout: Duration::from_secs(60),
                cache_update_retries: 2,
            },
            bloom: BloomConfig {
                enabled: true,
                max_filter_size_bytes: 16 * 1024,
                ..Default::default()
            },
            tokenizer: TokenizerConfig {
                offset_cache_max_positions: 64,
                ..Default::default()
            },
            dictionary_cache_entries: 16,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.tables.validate()?;
        if self.shard.default_num_shards == 0 {
            return Err(IndexError::Config("default_num_shards must be non-zero".into()));
        }
        if !(0.0..1.0).contains(&self.bloom.false_positive_rate) || self.bloom.false_positive_rate == 0.0 {
            return Err(IndexError::Config(format!(
                "bloom false_positive_rate must be in (0, 1), got {}",
                self.bloom.false_positive_rate
            )));
        }
        if self.tokenizer.term_length_minimum > self.tokenizer.term_length_limit {
            return Err(IndexError::Config(
                "tokenizer term_length_minimum exceeds term_length_limit".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(IndexConfig::default().validate().is_ok());
        assert!(IndexConfig::for_testing().validate().is_ok());
    }

    #[test]
    fn test_missing_event_table_is_fatal() {
        let mut config = IndexConfig::default();
        config.tables.event = String::new();
        assert!(matches!(config.validate(), Err(IndexError::Config(_))));
    }

    #[test]
    fn test_bad_fpr_rejected() {
        let mut config = IndexConfig::default();
        config.bloom.false_positive_rate = 1.5;
        assert!(config.validate().is_err());
    }
}
