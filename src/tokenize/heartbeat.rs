//! Coarse tokenization watchdog
//!
//! Checking wall-clock time per token is too expensive, so a background
//! thread bumps a shared counter on a fixed interval and the tokenizer
//! compares counter deltas instead. Crossing the warn threshold logs once
//! per record; crossing the error threshold aborts the record's remaining
//! tokenization.

use crate::config::TokenizerConfig;
use crate::error::{IndexError, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::warn;

/// Default beat interval. Coarse on purpose: the watchdog bounds runaway
/// records, it does not profile them.
pub const DEFAULT_BEAT_INTERVAL: Duration = Duration::from_millis(500);

/// Shared beat counter, one per ingest task.
pub struct Heartbeat {
    counter: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
    interval: Duration,
    thread: Option<JoinHandle<()>>,
}

impl Heartbeat {
    pub fn start() -> Self {
        Self::with_interval(DEFAULT_BEAT_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Self {
        let counter = Arc::new(AtomicU64::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));
        let thread = {
            let counter = Arc::clone(&counter);
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || {
                while !shutdown.load(Ordering::Relaxed) {
                    thread::sleep(interval);
                    counter.fetch_add(1, Ordering::Relaxed);
                }
            })
        };
        Self {
            counter,
            shutdown,
            interval,
            thread: Some(thread),
        }
    }

    pub fn count(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[cfg(test)]
    pub(crate) fn tick(&self, beats: u64) {
        self.counter.fetch_add(beats, Ordering::Relaxed);
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Per-record view over a [`Heartbeat`] with warn/error thresholds.
pub struct TokenizerWatch<'a> {
    heartbeat: &'a Heartbeat,
    last_count: u64,
    beats: u64,
    warn_threshold_ms: u64,
    error_threshold_ms: u64,
    warned: bool,
}

impl<'a> TokenizerWatch<'a> {
    pub fn new(heartbeat: &'a Heartbeat, config: &TokenizerConfig) -> Self {
        Self {
            heartbeat,
            last_count: heartbeat.count(),
            beats: 0,
            warn_threshold_ms: config.time_warn_threshold.as_millis() as u64,
            error_threshold_ms: config.time_error_threshold.as_millis() as u64,
            warned: false,
        }
    }

    /// Estimated time spent tokenizing since construction.
    pub fn elapsed_estimate_ms(&self) -> u64 {
        self.beats * self.heartbeat.interval().as_millis() as u64
    }

    pub fn warned(&self) -> bool {
        self.warned
    }

    /// Cheap per-token check. Warns once past the warn threshold; errors
    /// past the error threshold.
    pub fn check(&mut self, zone: &str) -> Result<()> {
        let current = self.heartbeat.count();
        if current == self.last_count {
            return Ok(());
        }
        self.beats += current - self.last_count;
        self.last_count = current;

        let elapsed_ms = self.elapsed_estimate_ms();
        if elapsed_ms > self.warn_threshold_ms && !self.warned {
            warn!(
                zone,
                elapsed_ms,
                threshold_ms = self.warn_threshold_ms,
                "tokenization exceeded warning threshold"
            );
            self.warned = true;
        }
        if elapsed_ms > self.error_threshold_ms {
            return Err(IndexError::TokenizerTimeout {
                zone: zone.to_string(),
                elapsed_ms,
                threshold_ms: self.error_threshold_ms,
            });
        }
        Ok(())
    }
}
