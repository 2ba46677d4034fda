//! Telemetry pipeline client seam.
//!
//! The generator only ever talks to a [`PipelineClient`]. Export, batching
//! and retry all live behind it.

mod memory;
mod otlp;

pub use memory::{MemoryPipeline, PipelineEvent};
pub use otlp::OtlpPipeline;

use crate::attributes::AttributeSet;
use crate::error::LoadgenResult;
use async_trait::async_trait;
use std::time::{Duration, SystemTime};

/// Log record severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

/// A log record handed to the pipeline.
#[derive(Debug)]
pub struct LogEntry<'a> {
    pub timestamp: SystemTime,
    pub severity: Severity,
    pub body: String,
    pub attributes: &'a AttributeSet,
}

/// Metric tag: key plus integer value.
pub type Tag = (&'static str, i64);

/// Client of the external telemetry pipeline.
///
/// Calls never fail from the caller's point of view; export errors are the
/// client's concern.
#[async_trait]
pub trait PipelineClient: Send + Sync + 'static {
    /// Scope a unit is started in.
    type Context: Clone + Send + Sync + 'static;
    /// Open unit, consumed by [`PipelineClient::end_unit`].
    type Unit: Send + 'static;

    /// Context with no parent unit.
    fn root_context(&self) -> Self::Context;

    fn start_unit(
        &self,
        parent: &Self::Context,
        name: String,
        attributes: &AttributeSet,
    ) -> (Self::Context, Self::Unit);

    fn end_unit(&self, unit: Self::Unit);

    fn increment_counter(&self, metric: &'static str, delta: u64, tags: &[Tag]);

    fn emit_log_record(&self, context: &Self::Context, entry: LogEntry<'_>);

    /// Flush and close, bounded by `timeout`.
    async fn shutdown(&self, timeout: Duration) -> LoadgenResult<()>;
}
