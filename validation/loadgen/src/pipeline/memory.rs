//! In-process pipeline for dry runs and tests.

use super::{LogEntry, PipelineClient, Severity, Tag};
use crate::attributes::AttributeSet;
use crate::error::LoadgenResult;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Everything a [`MemoryPipeline`] was asked to do, in call order.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    UnitStarted {
        id: u64,
        parent: Option<u64>,
        name: String,
        attributes: usize,
        at: Instant,
    },
    UnitEnded {
        id: u64,
        at: Instant,
    },
    Counter {
        metric: &'static str,
        delta: u64,
        tags: Vec<Tag>,
    },
    Log {
        unit: Option<u64>,
        severity: Severity,
        body: String,
        attributes: usize,
    },
}

/// Pipeline client that keeps everything in memory.
///
/// `discarding()` only counts, so long dry runs stay flat in memory.
#[derive(Debug, Default)]
pub struct MemoryPipeline {
    record: bool,
    events: Mutex<Vec<PipelineEvent>>,
    next_id: AtomicU64,
    started: AtomicU64,
    ended: AtomicU64,
    logs: AtomicU64,
    counter_total: AtomicU64,
    shut_down: AtomicBool,
}

impl MemoryPipeline {
    pub fn recording() -> Self {
        Self {
            record: true,
            ..Default::default()
        }
    }

    pub fn discarding() -> Self {
        Self::default()
    }

    fn push(&self, event: PipelineEvent) {
        if !self.record {
            return;
        }
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    /// Snapshot of recorded events.
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn units_started(&self) -> u64 {
        self.started.load(Ordering::Acquire)
    }

    pub fn units_ended(&self) -> u64 {
        self.ended.load(Ordering::Acquire)
    }

    /// Units started but not yet ended.
    pub fn open_units(&self) -> u64 {
        self.units_started().saturating_sub(self.units_ended())
    }

    pub fn logs_emitted(&self) -> u64 {
        self.logs.load(Ordering::Acquire)
    }

    /// Sum of all counter deltas.
    pub fn counter_total(&self) -> u64 {
        self.counter_total.load(Ordering::Acquire)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

#[async_trait]
impl PipelineClient for MemoryPipeline {
    type Context = Option<u64>;
    type Unit = u64;

    fn root_context(&self) -> Self::Context {
        None
    }

    fn start_unit(
        &self,
        parent: &Self::Context,
        name: String,
        attributes: &AttributeSet,
    ) -> (Self::Context, Self::Unit) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.started.fetch_add(1, Ordering::AcqRel);
        self.push(PipelineEvent::UnitStarted {
            id,
            parent: *parent,
            name,
            attributes: attributes.len(),
            at: Instant::now(),
        });
        (Some(id), id)
    }

    fn end_unit(&self, unit: Self::Unit) {
        self.push(PipelineEvent::UnitEnded {
            id: unit,
            at: Instant::now(),
        });
        self.ended.fetch_add(1, Ordering::AcqRel);
    }

    fn increment_counter(&self, metric: &'static str, delta: u64, tags: &[Tag]) {
        self.counter_total.fetch_add(delta, Ordering::AcqRel);
        self.push(PipelineEvent::Counter {
            metric,
            delta,
            tags: tags.to_vec(),
        });
    }

    fn emit_log_record(&self, context: &Self::Context, entry: LogEntry<'_>) {
        self.logs.fetch_add(1, Ordering::AcqRel);
        self.push(PipelineEvent::Log {
            unit: *context,
            severity: entry.severity,
            body: entry.body,
            attributes: entry.attributes.len(),
        });
    }

    async fn shutdown(&self, _timeout: Duration) -> LoadgenResult<()> {
        self.shut_down.store(true, Ordering::Release);
        Ok(())
    }
}
