//! Synthetic telemetry load generator.
//!
//! This crate drives a telemetry-ingestion pipeline hard enough to exercise
//! its backpressure and memory protection:
//! - Spin up N concurrent producers sharing one aggregate target rate
//! - Shape that rate over time (burst, sustained, spike, rampup)
//! - Generate nested unit-of-work trees with large, tunable attributes
//! - Report locally observed throughput while the run is in progress

pub mod attributes;
pub mod config;
pub mod error;
pub mod generator;
pub mod metrics;
pub mod pipeline;
pub mod pool;
pub mod progress;
pub mod rate;
pub mod report;
pub mod runner;
pub mod scenario;

pub use attributes::{AttributeFactory, AttributeSet};
pub use config::{LoadConfig, Scenario};
pub use error::{LoadgenError, LoadgenResult};
pub use generator::{GeneratedTree, UnitGenerator};
pub use metrics::{CounterSnapshot, Counters, RunSummary, WorkerStats};
pub use pipeline::{MemoryPipeline, OtlpPipeline, PipelineClient};
pub use pool::{Pacing, WorkerPool};
pub use progress::ProgressReporter;
pub use rate::{RateController, RateShape, SharedRate};
pub use report::ResultsReport;
pub use runner::LoadRunner;
pub use scenario::{run_scenario, ScenarioOutcome};
