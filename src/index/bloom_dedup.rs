//! Per-record bloom dedup filter with resource budgets
//!
//! Suppresses redundant field-index emission for (field, value) pairs that
//! already appeared in the current record. Purely a write-amplification
//! optimization: the filter is built fresh per record, never persisted, and
//! its negatives are never authoritative for anything but suppression.
//! Disk, memory and time budgets are probed while the filter is live; the
//! moment any budget is exhausted the filter freezes and every subsequent
//! answer is "emit".

use crate::config::BloomConfig;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::debug;

/// Budget probes consulted while the filter accepts entries.
///
/// Fractions are in `[0, 1]`; production uses [`SystemResourceMonitor`],
/// tests inject fixed values.
pub trait ResourceMonitor {
    fn disk_available_fraction(&self, path: &Path) -> f64;
    fn memory_available_fraction(&self) -> f64;
    fn time_remaining_fraction(&self) -> f64;
}

/// Probes the actual system: statvfs for disk, /proc/meminfo for memory,
/// and a task deadline for time.
pub struct SystemResourceMonitor {
    started: Instant,
    task_timeout: Option<Duration>,
}

impl SystemResourceMonitor {
    pub fn new(task_timeout: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            task_timeout,
        }
    }
}

impl ResourceMonitor for SystemResourceMonitor {
    fn disk_available_fraction(&self, path: &Path) -> f64 {
        let Ok(cpath) = std::ffi::CString::new(path.as_os_str().as_encoded_bytes()) else {
            return 1.0;
        };
        let mut stats: libc::statvfs = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::statvfs(cpath.as_ptr(), &mut stats) };
        if rc != 0 || stats.f_blocks == 0 {
            return 1.0;
        }
        stats.f_bavail as f64 / stats.f_blocks as f64
    }

    fn memory_available_fraction(&self) -> f64 {
        let Ok(meminfo) = std::fs::read_to_string("/proc/meminfo") else {
            return 1.0;
        };
        let field = |name: &str| -> Option<f64> {
            meminfo
                .lines()
                .find(|line| line.starts_with(name))?
                .split_whitespace()
                .nth(1)?
                .parse()
                .ok()
        };
        match (field("MemAvailable:"), field("MemTotal:")) {
            (Some(available), Some(total)) if total > 0.0 => available / total,
            _ => 1.0,
        }
    }

    fn time_remaining_fraction(&self) -> f64 {
        match self.task_timeout {
            None => 1.0,
            Some(timeout) if timeout.is_zero() => 0.0,
            Some(timeout) => {
                let elapsed = self.started.elapsed().as_secs_f64();
                (1.0 - elapsed / timeout.as_secs_f64()).max(0.0)
            }
        }
    }
}

/// How often budgets are re-probed, in accepted entries.
const BUDGET_PROBE_INTERVAL: usize = 64;

/// Per-record dedup filter.
pub struct BloomDedupFilter<'a> {
    bits: Vec<u8>,
    num_bits: usize,
    num_hashes: u32,
    frozen: bool,
    inserts: usize,
    config: &'a BloomConfig,
    monitor: &'a dyn ResourceMonitor,
}

impl<'a> BloomDedupFilter<'a> {
    /// Size the filter for `expected_entries` at the configured
    /// false-positive rate, capped by the byte budget.
    pub fn new(
        config: &'a BloomConfig,
        expected_entries: usize,
        monitor: &'a dyn ResourceMonitor,
    ) -> Self {
        let n = expected_entries.max(1) as f64;
        let ln2 = std::f64::consts::LN_2;
        let optimal_bits = (-(n * config.false_positive_rate.ln()) / (ln2 * ln2)).ceil() as usize;
        let num_bits = optimal_bits.clamp(64, config.max_filter_size_bytes.max(8) * 8);
        let num_hashes = ((num_bits as f64 / n) * ln2).round().clamp(1.0, 30.0) as u32;

        Self {
            bits: vec![0u8; num_bits.div_ceil(8)],
            num_bits,
            num_hashes,
            frozen: false,
            inserts: 0,
            config,
            monitor,
        }
    }

    /// Whether a (field, value) index entry should be emitted.
    ///
    /// False only when the pair was (probably) already seen this record.
    /// A frozen or disabled filter always answers true.
    pub fn should_emit(&mut self, field: &str, value: &str) -> bool {
        if !self.config.enabled || self.frozen {
            return true;
        }
        if self.inserts % BUDGET_PROBE_INTERVAL == 0 && self.budget_exhausted() {
            debug!("bloom dedup budget exhausted, falling back to always-emit");
            self.frozen = true;
            return true;
        }

        let mut seen = true;
        for seed in 0..self.num_hashes {
            let bit = (self.hash(field, value, seed) as usize) % self.num_bits;
            if !self.get_bit(bit) {
                seen = false;
                self.set_bit(bit);
            }
        }
        if !seen {
            self.inserts += 1;
        }
        !seen
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn byte_size(&self) -> usize {
        self.bits.len()
    }

    fn budget_exhausted(&self) -> bool {
        if self.config.min_disk_fraction > 0.0 {
            let path = Path::new(&self.config.disk_threshold_path);
            if self.monitor.disk_available_fraction(path) < self.config.min_disk_fraction {
                return true;
            }
        }
        if self.config.min_memory_fraction > 0.0
            && self.monitor.memory_available_fraction() < self.config.min_memory_fraction
        {
            return true;
        }
        if self.config.min_time_fraction > 0.0
            && self.monitor.time_remaining_fraction() < self.config.min_time_fraction
        {
            return true;
        }
        false
    }

    fn hash(&self, field: &str, value: &str, seed: u32) -> u64 {
        let mut hasher = DefaultHasher::new();
        seed.hash(&mut hasher);
        field.hash(&mut hasher);
        value.hash(&mut hasher);
        hasher.finish()
    }

    fn set_bit(&mut self, pos: usize) {
        self.bits[pos / 8] |= 1 << (pos % 8);
    }

    fn get_bit(&self, pos: usize) -> bool {
        (self.bits[pos / 8] & (1 << (pos % 8))) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedMonitor {
        disk: f64,
        memory: f64,
        time: f64,
    }

    impl FixedMonitor {
        fn healthy() -> Self {
            Self {
                disk: 1.0,
                memory: 1.0,
                time: 1.0,
            }
        }
    }

    impl ResourceMonitor for FixedMonitor {
        fn disk_available_fraction(&self, _path: &Path) -> f64 {
            self.disk
        }
        fn memory_available_fraction(&self) -> f64 {
            self.memory
        }
        fn time_remaining_fraction(&self) -> f64 {
            self.time
        }
    }

    fn enabled_config() -> BloomConfig {
        BloomConfig {
            enabled: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_suppresses_repeats() {
        let config = enabled_config();
        let monitor = FixedMonitor::healthy();
        let mut filter = BloomDedupFilter::new(&config, 128, &monitor);
        assert!(filter.should_emit("NAME", "alice"));
        assert!(!filter.should_emit("NAME", "alice"));
        assert!(filter.should_emit("NAME", "bob"));
        assert!(filter.should_emit("OTHER", "alice"));
    }

    #[test]
    fn test_disabled_filter_always_emits() {
        let config = BloomConfig::default();
        let monitor = FixedMonitor::healthy();
        let mut filter = BloomDedupFilter::new(&config, 128, &monitor);
        assert!(filter.should_emit("NAME", "alice"));
        assert!(filter.should_emit("NAME", "alice"));
    }

    #[test]
    fn test_budget_exhaustion_freezes_to_always_emit() {
        let config = BloomConfig {
            min_disk_fraction: 0.5,
            ..enabled_config()
        };
        let monitor = FixedMonitor {
            disk: 0.1,
            ..FixedMonitor::healthy()
        };
        let mut filter = BloomDedupFilter::new(&config, 128, &monitor);
        assert!(filter.should_emit("NAME", "alice"));
        assert!(filter.is_frozen());
        // repeats are no longer suppressed once frozen
        assert!(filter.should_emit("NAME", "alice"));
    }

    #[test]
    fn test_time_budget() {
        let config = BloomConfig {
            min_time_fraction: 0.2,
            ..enabled_config()
        };
        let exhausted = FixedMonitor {
            time: 0.1,
            ..FixedMonitor::healthy()
        };
        let mut filter = BloomDedupFilter::new(&config, 16, &exhausted);
        filter.should_emit("F", "v");
        assert!(filter.is_frozen());
    }

    #[test]
    fn test_byte_budget_caps_size() {
        let config = BloomConfig {
            max_filter_size_bytes: 64,
            false_positive_rate: 0.0001,
            ..enabled_config()
        };
        let monitor = FixedMonitor::healthy();
        let filter = BloomDedupFilter::new(&config, 1_000_000, &monitor);
        assert!(filter.byte_size() <= 64);
    }

    #[test]
    fn test_false_positive_rate_reasonable() {
        let config = enabled_config();
        let monitor = FixedMonitor::healthy();
        // sized for the full probe population because every probe inserts
        let mut filter = BloomDedupFilter::new(&config, 12_000, &monitor);
        for i in 0..1000 {
            filter.should_emit("F", &format!("value-{i}"));
        }
        let mut suppressed = 0;
        for i in 1000..11_000 {
            if !filter.should_emit("PROBE", &format!("value-{i}")) {
                suppressed += 1;
            }
        }
        // fresh pairs wrongly suppressed = false positives; the probe
        // itself inserts, so allow headroom over the configured 1%
        let rate = suppressed as f64 / 10_000.0;
        assert!(rate < 0.05, "false positive rate too high: {rate}");
    }

    #[test]
    fn test_system_monitor_sane_ranges() {
        let monitor = SystemResourceMonitor::new(Some(Duration::from_secs(3600)));
        let disk = monitor.disk_available_fraction(Path::new("/"));
        assert!((0.0..=1.0).contains(&disk));
        let memory = monitor.memory_available_fraction();
        assert!((0.0..=1.0).contains(&memory));
        let time = monitor.time_remaining_fraction();
        assert!((0.0..=1.0).contains(&time));
        assert_eq!(SystemResourceMonitor::new(None).time_remaining_fraction(), 1.0);
    }
}
