//! Load run orchestration: pipeline setup, scenario execution, shutdown.

use crate::config::LoadConfig;
use crate::error::LoadgenResult;
use crate::metrics::{Counters, RunSummary};
use crate::pipeline::{MemoryPipeline, OtlpPipeline, PipelineClient};
use crate::scenario::run_scenario;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Executes one load run end to end.
pub struct LoadRunner {
    config: LoadConfig,
    counters: Arc<Counters>,
}

impl LoadRunner {
    /// Validate the configuration; nothing is connected yet.
    pub fn new(config: LoadConfig) -> LoadgenResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            counters: Arc::new(Counters::new()),
        })
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    pub fn counters(&self) -> Arc<Counters> {
        self.counters.clone()
    }

    /// Log the effective configuration.
    pub fn log_banner(&self) {
        let c = &self.config;
        info!("========================================");
        info!("Loadgen starting...");
        info!("  Endpoint:         {}", c.endpoint);
        info!("  Scenario:         {}", c.scenario);
        info!("  Duration:         {}", humantime::format_duration(c.duration));
        info!("  Workers:          {}", c.workers);
        info!("  Units/sec:        {}", c.rate);
        info!("  Depth:            {}", c.depth);
        info!("  Attribute Size:   {} bytes", c.attr_size);
        info!("  Attribute Count:  {}", c.attr_count);
        info!("  Metrics:          {}", c.metrics);
        info!("  Logs:             {}", c.logs);
        info!("  High Cardinality: {}", c.high_cardinality);
        if c.dry_run {
            info!("  Dry run:          no data leaves the process");
        }
        info!("========================================");
    }

    /// Connect the configured pipeline and run.
    pub async fn run(&self, cancel: CancellationToken) -> LoadgenResult<RunSummary> {
        if self.config.dry_run {
            let pipeline = Arc::new(MemoryPipeline::discarding());
            self.run_with(pipeline, cancel).await
        } else {
            let pipeline = Arc::new(OtlpPipeline::connect(&self.config)?);
            self.run_with(pipeline, cancel).await
        }
    }

    /// Run against an already constructed pipeline client, then shut it
    /// down. A failed shutdown is logged and does not fail the run.
    pub async fn run_with<P: PipelineClient>(
        &self,
        pipeline: Arc<P>,
        cancel: CancellationToken,
    ) -> LoadgenResult<RunSummary> {
        let outcome = run_scenario(
            &self.config,
            pipeline.clone(),
            self.counters.clone(),
            cancel,
        )
        .await?;

        if outcome.cancelled {
            info!(scenario = %outcome.scenario, "Run cancelled, shutting down");
        }

        if let Err(e) = pipeline.shutdown(self.config.shutdown_timeout).await {
            warn!(error = %e, "Error shutting down pipeline");
        }

        let totals = self.counters.snapshot();
        let summary = RunSummary::new(
            &self.config,
            totals,
            &outcome.stats,
            outcome.elapsed,
            outcome.cancelled,
        );

        info!("========================================");
        info!("Loadgen finished");
        info!("  Total units sent: {}", totals.units);
        if self.config.logs {
            info!("  Total logs sent:  {}", totals.logs);
        }
        info!("========================================");

        Ok(summary)
    }
}
