//! File-backed shard-count table cache with atomic refresh
//!
//! The source of truth for per-date shard counts lives in a metadata table
//! owned by operations; every ingest task and query head caches a snapshot
//! of it as a local artifact. Refresh discipline: write a temp file next to
//! the artifact, checksum it, fsync, then atomically rename into place with
//! bounded retries. Concurrent refreshers racing on the rename are expected
//! and harmless: last writer wins and every snapshot is internally
//! consistent.

use super::assigner::ShardTable;
use crate::config::ShardConfig;
use crate::error::{IndexError, Result};
use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Provides the source-of-truth shard-count rows.
///
/// Implemented over the metadata table in production; tests inject fixed
/// row sets.
pub trait ShardCountSource {
    fn fetch(&self) -> Result<Vec<(NaiveDate, u32)>>;
}

impl<F> ShardCountSource for F
where
    F: Fn() -> Result<Vec<(NaiveDate, u32)>>,
{
    fn fetch(&self) -> Result<Vec<(NaiveDate, u32)>> {
        self()
    }
}

#[derive(Serialize, Deserialize)]
struct CacheSnapshot {
    created_ms: u64,
    table: ShardTable,
}

/// Cache artifact manager for one artifact path.
pub struct ShardTableCache {
    path: PathBuf,
    config: ShardConfig,
}

impl ShardTableCache {
    pub fn new(path: impl Into<PathBuf>, config: ShardConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached table, refreshing from `source` first when the
    /// artifact is missing or stale. An unreadable artifact that cannot be
    /// refreshed is a hard error; shard assignment never guesses.
    pub fn load_or_refresh(&self, source: &dyn ShardCountSource) -> Result<ShardTable> {
        match self.load() {
            Ok(table) => Ok(table),
            Err(err) => {
                debug!(artifact = %self.path.display(), %err, "shard table cache needs refresh");
                self.update_cache(source)?;
                self.load()
            }
        }
    }

    /// Load the cached table, enforcing checksum and freshness.
    pub fn load(&self) -> Result<ShardTable> {
        let mut buf = Vec::new();
        File::open(&self.path)?.read_to_end(&mut buf)?;
        if buf.len() < 4 {
            return Err(IndexError::Corruption(format!(
                "shard table artifact too small: {}",
                self.path.display()
            )));
        }
        let (payload, crc_bytes) = buf.split_at(buf.len() - 4);
        let stored_crc = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(payload);
        if hasher.finalize() != stored_crc {
            return Err(IndexError::Corruption(format!(
                "shard table artifact checksum mismatch: {}",
                self.path.display()
            )));
        }

        let snapshot: CacheSnapshot = bincode::deserialize(payload)?;
        let age = now_millis().saturating_sub(snapshot.created_ms);
        if Duration::from_millis(age) > self.config.cache_timeout {
            return Err(IndexError::StaleCache(self.path.clone()));
        }
        Ok(snapshot.table)
    }

    /// Re-read the source of truth and atomically swap the artifact in.
    ///
    /// The temp file carries the writer's pid so concurrent refreshers
    /// never collide on the scratch path; whoever renames last wins.
    pub fn update_cache(&self, source: &dyn ShardCountSource) -> Result<()> {
        let rows = source.fetch()?;
        let table = ShardTable::with_overrides(self.config.default_num_shards, rows)?;
        let snapshot = CacheSnapshot {
            created_ms: now_millis(),
            table,
        };

        let mut payload = bincode::serialize(&snapshot)?;
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&payload);
        payload.extend_from_slice(&hasher.finalize().to_le_bytes());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut last_err = None;
        for attempt in 0..self.config.cache_update_retries.max(1) {
            match self.try_swap(&payload, attempt) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(
                        artifact = %self.path.display(),
                        attempt,
                        %err,
                        "shard table artifact swap failed, retrying"
                    );
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            IndexError::Config("shard table cache update exhausted retries".into())
        }))
    }

    fn try_swap(&self, payload: &[u8], attempt: u32) -> Result<()> {
        let tmp_path = self
            .path
            .with_extension(format!("tmp.{}.{}", process::id(), attempt));
        let mut tmp = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        tmp.write_all(payload)?;
        tmp.sync_all()?;
        drop(tmp);

        // rename is atomic on the same filesystem; replacing an artifact a
        // concurrent refresher just installed is a non-error
        match fs::rename(&tmp_path, &self.path) {
            Ok(()) => Ok(()),
            Err(err) => {
                let _ = fs::remove_file(&tmp_path);
                Err(err.into())
            }
        }
    }
}

/// Shared, swappable shard table for components that outlive one refresh
/// (e.g. a store client reused across ingest tasks).
#[derive(Clone)]
pub struct ShardTableHandle {
    inner: Arc<RwLock<ShardTable>>,
}

impl ShardTableHandle {
    pub fn new(table: ShardTable) -> Self {
        Self {
            inner: Arc::new(RwLock::new(table)),
        }
    }

    pub fn num_shards(&self, date: NaiveDate) -> u32 {
        self.inner.read().num_shards(date)
    }

    pub fn snapshot(&self) -> ShardTable {
        self.inner.read().clone()
    }

    /// Swap in a freshly loaded table.
    pub fn replace(&self, table: ShardTable) {
        *self.inner.write() = table;
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
