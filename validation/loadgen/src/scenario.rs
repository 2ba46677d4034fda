//! Scenario dispatch: wires the rate controller, worker pool and progress
//! reporter together for one run.

use crate::config::{LoadConfig, Scenario};
use crate::error::LoadgenResult;
use crate::generator::UnitGenerator;
use crate::metrics::{Counters, WorkerStats};
use crate::pipeline::PipelineClient;
use crate::pool::{pacing_interval, Pacing, WorkerPool};
use crate::progress::ProgressReporter;
use crate::rate::{RateController, RateShape};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// What a finished scenario hands back to the runner.
pub struct ScenarioOutcome {
    pub scenario: Scenario,
    pub stats: WorkerStats,
    pub elapsed: Duration,
    pub cancelled: bool,
}

/// Run the configured scenario to completion.
///
/// Fails before starting any task if the configuration is invalid, e.g.
/// the scenario name is unknown.
pub async fn run_scenario<P: PipelineClient>(
    config: &LoadConfig,
    pipeline: Arc<P>,
    counters: Arc<Counters>,
    cancel: CancellationToken,
) -> LoadgenResult<ScenarioOutcome> {
    config.validate()?;
    let scenario = config.scenario()?;
    let shape = RateShape::for_scenario(scenario, config.rate);
    let (controller, rate) = RateController::new(shape, config.step_interval);

    let pacing = match scenario {
        Scenario::Burst => {
            info!("[BURST] Starting burst mode - sending as fast as possible");
            Pacing::Unpaced
        }
        Scenario::Sustained => {
            let interval = pacing_interval(config.rate, config.workers);
            info!(
                rate = config.rate,
                duration = %humantime::format_duration(config.duration),
                interval = ?interval,
                "[SUSTAINED] Starting constant rate"
            );
            Pacing::Fixed(interval)
        }
        Scenario::Spike => {
            info!(
                normal = rate.load(),
                spike = config.rate,
                "[SPIKE] Alternating between normal and spike load"
            );
            Pacing::Dynamic(rate.clone())
        }
        Scenario::Rampup => {
            info!(
                start = rate.load(),
                max = config.rate,
                "[RAMPUP] Gradually increasing load"
            );
            Pacing::Dynamic(rate.clone())
        }
    };

    let start = Instant::now();
    let deadline = start + config.duration;

    // Auxiliary loops also stop once the workers are done.
    let aux_cancel = cancel.child_token();
    let mut aux = Vec::with_capacity(2);
    if controller.shape().is_dynamic() {
        aux.push(tokio::spawn(controller.run(deadline, aux_cancel.clone())));
    }
    let reporter = ProgressReporter::new(counters.clone(), config.progress_interval, config.logs);
    aux.push(tokio::spawn(reporter.run(deadline, aux_cancel.clone())));

    let generator = UnitGenerator::new(config, pipeline, counters);
    let pool = WorkerPool::new(generator, config.workers, pacing);
    let stats = pool.run(deadline, cancel.clone()).await;

    aux_cancel.cancel();
    for handle in futures::future::join_all(aux).await {
        handle?;
    }

    Ok(ScenarioOutcome {
        scenario,
        stats: stats?,
        elapsed: start.elapsed(),
        cancelled: cancel.is_cancelled(),
    })
}
