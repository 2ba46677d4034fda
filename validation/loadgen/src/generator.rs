//! Nested unit-of-work tree generation.

use crate::attributes::{AttributeFactory, AttributeSet};
use crate::config::LoadConfig;
use crate::metrics::Counters;
use crate::pipeline::{LogEntry, PipelineClient, Severity};
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::{sleep, Instant};

/// Counter bumped once per generated tree when metrics are enabled.
pub const TREES_GENERATED_METRIC: &str = "loadgen.traces.generated";

const LOG_BODY_CHUNK: &str = "Log message content. ";

/// Result of one [`UnitGenerator::generate`] call.
#[derive(Debug)]
pub struct GeneratedTree<C> {
    /// Context of the (already ended) root unit.
    pub root: C,
    /// Units created and ended: depth + 1.
    pub units: u64,
    pub elapsed: Duration,
}

/// Builds one root unit plus `depth` linearly nested children per call.
pub struct UnitGenerator<P: PipelineClient> {
    pipeline: Arc<P>,
    counters: Arc<Counters>,
    attributes: AttributeFactory,
    depth: usize,
    max_child_delay: Duration,
    metrics: bool,
    logs: bool,
    log_padding: String,
}

impl<P: PipelineClient> UnitGenerator<P> {
    pub fn new(config: &LoadConfig, pipeline: Arc<P>, counters: Arc<Counters>) -> Self {
        Self {
            pipeline,
            counters,
            attributes: AttributeFactory::new(
                config.attr_count,
                config.attr_size,
                config.high_cardinality,
            ),
            depth: config.depth,
            max_child_delay: config.max_child_delay,
            metrics: config.metrics,
            logs: config.logs,
            log_padding: LOG_BODY_CHUNK.repeat(config.attr_size / 20 + 1),
        }
    }

    /// Generate one complete tree for `worker_id`.
    ///
    /// Not cancellable: once started, every unit is ended before returning.
    pub async fn generate(&self, worker_id: usize) -> GeneratedTree<P::Context> {
        let start = Instant::now();
        let attrs = self.attributes.build(worker_id);

        let (root_cx, root) = self.pipeline.start_unit(
            &self.pipeline.root_context(),
            format!("worker-{}-root", worker_id),
            &attrs,
        );

        // Open children outermost first; each nests under the previous one.
        let mut open: Vec<P::Unit> = Vec::with_capacity(self.depth);
        let mut parent = root_cx.clone();
        for level in (1..=self.depth).rev() {
            let (cx, unit) = self.pipeline.start_unit(
                &parent,
                format!("worker-{}-child-{}", worker_id, level),
                &attrs,
            );
            open.push(unit);
            parent = cx;
            sleep(self.child_delay()).await;
        }

        // Innermost first, root last.
        while let Some(unit) = open.pop() {
            self.pipeline.end_unit(unit);
        }
        self.pipeline.end_unit(root);

        let units = self.depth as u64 + 1;
        self.counters.add_units(units);

        if self.metrics {
            self.pipeline
                .increment_counter(TREES_GENERATED_METRIC, 1, &[("worker_id", worker_id as i64)]);
        }

        if self.logs {
            self.emit_log(&root_cx, worker_id, &attrs);
        }

        GeneratedTree {
            root: root_cx,
            units,
            elapsed: start.elapsed(),
        }
    }

    fn emit_log(&self, cx: &P::Context, worker_id: usize, attrs: &AttributeSet) {
        self.pipeline.emit_log_record(
            cx,
            LogEntry {
                timestamp: SystemTime::now(),
                severity: Severity::Info,
                body: format!("[Worker-{}] {}", worker_id, self.log_padding),
                attributes: attrs,
            },
        );
        self.counters.add_logs(1);
    }

    fn child_delay(&self) -> Duration {
        let max_us = self.max_child_delay.as_micros().min(u64::MAX as u128) as u64;
        if max_us == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(rand::thread_rng().gen_range(0..=max_us))
    }
}
