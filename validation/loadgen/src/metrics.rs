//! Shared run counters and per-worker statistics.

use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Process-wide monotonic counters, incremented by every worker.
#[derive(Debug, Default)]
pub struct Counters {
    units: AtomicU64,
    logs: AtomicU64,
}

/// Point-in-time read of [`Counters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub units: u64,
    pub logs: u64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_units(&self, n: u64) {
        self.units.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_logs(&self, n: u64) {
        self.logs.fetch_add(n, Ordering::Relaxed);
    }

    pub fn units(&self) -> u64 {
        self.units.load(Ordering::Relaxed)
    }

    pub fn logs(&self) -> u64 {
        self.logs.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            units: self.units(),
            logs: self.logs(),
        }
    }
}

/// Statistics owned by a single worker; merged once all workers join.
pub struct WorkerStats {
    histogram: Histogram<u64>,
    trees: u64,
    units: u64,
}

impl WorkerStats {
    pub fn new() -> Self {
        Self {
            // Tree latency in microseconds, auto-resizing.
            histogram: Histogram::new(3).expect("3 significant figures is a valid precision"),
            trees: 0,
            units: 0,
        }
    }

    /// Record one completed tree.
    pub fn record_tree(&mut self, units: u64, elapsed: Duration) {
        self.trees += 1;
        self.units += units;
        self.histogram.record(elapsed.as_micros() as u64).ok();
    }

    pub fn merge(&mut self, other: &WorkerStats) {
        self.trees += other.trees;
        self.units += other.units;
        self.histogram.add(&other.histogram).ok();
    }

    pub fn trees(&self) -> u64 {
        self.trees
    }

    pub fn units(&self) -> u64 {
        self.units
    }

    /// Tree latency summary in milliseconds.
    pub fn latency(&self) -> LatencySummary {
        if self.histogram.is_empty() {
            return LatencySummary::default();
        }
        let ms = |us: u64| us as f64 / 1000.0;
        LatencySummary {
            p50: ms(self.histogram.value_at_percentile(50.0)),
            p90: ms(self.histogram.value_at_percentile(90.0)),
            p99: ms(self.histogram.value_at_percentile(99.0)),
            max: ms(self.histogram.max()),
            avg: self.histogram.mean() / 1000.0,
        }
    }
}

impl Default for WorkerStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Tree generation latency percentiles (ms).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencySummary {
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
    pub max: f64,
    pub avg: f64,
}

/// Final run results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub timestamp: String,
    pub scenario: String,
    pub endpoint: String,
    pub dry_run: bool,
    pub workers: usize,
    pub target_rate: u64,
    pub configured_duration_secs: f64,
    pub elapsed_secs: f64,
    pub cancelled: bool,

    // Totals
    pub trees: u64,
    pub units: u64,
    pub logs: u64,

    // Throughput
    pub units_per_second: f64,
    pub trees_per_second: f64,

    // Tree generation latency (ms)
    pub tree_latency_p50: f64,
    pub tree_latency_p90: f64,
    pub tree_latency_p99: f64,
    pub tree_latency_max: f64,
    pub tree_latency_avg: f64,
}

impl RunSummary {
    /// Totals come from the shared counters; tree counts and latency from
    /// the merged worker stats.
    pub fn new(
        config: &crate::config::LoadConfig,
        totals: CounterSnapshot,
        stats: &WorkerStats,
        elapsed: Duration,
        cancelled: bool,
    ) -> Self {
        let elapsed_secs = elapsed.as_secs_f64();
        let per_sec = |n: u64| {
            if elapsed_secs > 0.0 {
                n as f64 / elapsed_secs
            } else {
                0.0
            }
        };
        let latency = stats.latency();

        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            scenario: config.scenario.clone(),
            endpoint: config.endpoint.clone(),
            dry_run: config.dry_run,
            workers: config.workers,
            target_rate: config.rate,
            configured_duration_secs: config.duration.as_secs_f64(),
            elapsed_secs,
            cancelled,
            trees: stats.trees(),
            units: totals.units,
            logs: totals.logs,
            units_per_second: per_sec(totals.units),
            trees_per_second: per_sec(stats.trees()),
            tree_latency_p50: latency.p50,
            tree_latency_p90: latency.p90,
            tree_latency_p99: latency.p99,
            tree_latency_max: latency.max,
            tree_latency_avg: latency.avg,
        }
    }
}
