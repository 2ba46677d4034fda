//! Periodic throughput reporting.

use crate::metrics::{CounterSnapshot, Counters};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// One progress sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    pub totals: CounterSnapshot,
    pub units_per_sec: f64,
    pub logs_per_sec: f64,
    pub remaining: Duration,
}

/// Samples [`Counters`] on a fixed interval and logs instantaneous rates.
///
/// Reads counters only; its last-seen snapshot is its sole state.
pub struct ProgressReporter {
    counters: Arc<Counters>,
    interval: Duration,
    logs_enabled: bool,
    last: CounterSnapshot,
}

impl ProgressReporter {
    pub fn new(counters: Arc<Counters>, interval: Duration, logs_enabled: bool) -> Self {
        Self {
            counters,
            interval,
            logs_enabled,
            last: CounterSnapshot::default(),
        }
    }

    /// Take a sample and advance the last-seen snapshot.
    pub fn sample(&mut self, remaining: Duration) -> ProgressSample {
        let current = self.counters.snapshot();
        let secs = self.interval.as_secs_f64();
        let sample = ProgressSample {
            totals: current,
            units_per_sec: current.units.saturating_sub(self.last.units) as f64 / secs,
            logs_per_sec: current.logs.saturating_sub(self.last.logs) as f64 / secs,
            remaining,
        };
        self.last = current;
        sample
    }

    pub async fn run(mut self, deadline: Instant, cancel: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = sleep_until(deadline) => return,
                _ = ticker.tick() => {
                    let now = Instant::now();
                    if now >= deadline {
                        return;
                    }
                    let sample = self.sample(deadline - now);
                    self.log(&sample);
                }
            }
        }
    }

    fn log(&self, sample: &ProgressSample) {
        let remaining = humantime::format_duration(Duration::from_secs(sample.remaining.as_secs()));
        if self.logs_enabled {
            info!(
                units = sample.totals.units,
                units_per_sec = format!("{:.0}", sample.units_per_sec),
                logs = sample.totals.logs,
                logs_per_sec = format!("{:.0}", sample.logs_per_sec),
                remaining = %remaining,
                "[PROGRESS]"
            );
        } else {
            info!(
                units = sample.totals.units,
                units_per_sec = format!("{:.0}", sample.units_per_sec),
                remaining = %remaining,
                "[PROGRESS]"
            );
        }
    }
}
