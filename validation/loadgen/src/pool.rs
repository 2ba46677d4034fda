//! Concurrent producers and their pacing loops.

use crate::error::LoadgenResult;
use crate::generator::UnitGenerator;
use crate::metrics::WorkerStats;
use crate::pipeline::PipelineClient;
use crate::rate::SharedRate;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, sleep, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Per-worker interval for an aggregate rate split across `workers`.
/// The per-worker rate never drops below 1 unit/sec.
pub fn pacing_interval(aggregate_rate: u64, workers: usize) -> Duration {
    let per_worker = (aggregate_rate / workers.max(1) as u64).max(1);
    let interval = Duration::from_secs(1) / per_worker.min(u32::MAX as u64) as u32;
    interval.max(Duration::from_nanos(1))
}

/// How each worker spaces out its trees.
#[derive(Debug, Clone)]
pub enum Pacing {
    /// Loop as fast as possible.
    Unpaced,
    /// Periodic timer with a fixed period.
    Fixed(Duration),
    /// Sleep before every tree; interval recomputed from the live rate.
    Dynamic(SharedRate),
}

/// Fixed-size pool of producers sharing one generator.
pub struct WorkerPool<P: PipelineClient> {
    generator: Arc<UnitGenerator<P>>,
    workers: usize,
    pacing: Pacing,
}

impl<P: PipelineClient> WorkerPool<P> {
    pub fn new(generator: UnitGenerator<P>, workers: usize, pacing: Pacing) -> Self {
        Self {
            generator: Arc::new(generator),
            workers,
            pacing,
        }
    }

    /// Run every worker until `deadline` or cancellation; returns the merged
    /// worker statistics once all of them have stopped.
    pub async fn run(self, deadline: Instant, cancel: CancellationToken) -> LoadgenResult<WorkerStats> {
        let handles: Vec<_> = (0..self.workers)
            .map(|worker_id| {
                let worker = Worker {
                    id: worker_id,
                    workers: self.workers,
                    generator: self.generator.clone(),
                    pacing: self.pacing.clone(),
                    deadline,
                    cancel: cancel.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        let mut merged = WorkerStats::new();
        for result in futures::future::join_all(handles).await {
            merged.merge(&result?);
        }
        Ok(merged)
    }
}

struct Worker<P: PipelineClient> {
    id: usize,
    workers: usize,
    generator: Arc<UnitGenerator<P>>,
    pacing: Pacing,
    deadline: Instant,
    cancel: CancellationToken,
}

impl<P: PipelineClient> Worker<P> {
    async fn run(self) -> WorkerStats {
        let mut stats = WorkerStats::new();
        match self.pacing.clone() {
            Pacing::Unpaced => self.run_unpaced(&mut stats).await,
            Pacing::Fixed(interval) => self.run_fixed(interval, &mut stats).await,
            Pacing::Dynamic(rate) => self.run_dynamic(&rate, &mut stats).await,
        }
        debug!(worker = self.id, trees = stats.trees(), "Worker stopped");
        stats
    }

    fn should_stop(&self) -> bool {
        self.cancel.is_cancelled() || Instant::now() >= self.deadline
    }

    async fn produce(&self, stats: &mut WorkerStats) {
        let tree = self.generator.generate(self.id).await;
        stats.record_tree(tree.units, tree.elapsed);
    }

    async fn run_unpaced(&self, stats: &mut WorkerStats) {
        while !self.should_stop() {
            self.produce(stats).await;
            // Keep a depth-0 burst from starving the other tasks.
            tokio::task::yield_now().await;
        }
    }

    async fn run_fixed(&self, interval: Duration, stats: &mut WorkerStats) {
        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                _ = sleep_until(self.deadline) => return,
                _ = ticker.tick() => {
                    if self.should_stop() {
                        return;
                    }
                    self.produce(stats).await;
                }
            }
        }
    }

    async fn run_dynamic(&self, rate: &SharedRate, stats: &mut WorkerStats) {
        while !self.should_stop() {
            let interval = pacing_interval(rate.load(), self.workers);
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                _ = sleep_until(self.deadline) => return,
                _ = sleep(interval) => {}
            }
            self.produce(stats).await;
        }
    }
}
