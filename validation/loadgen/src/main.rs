//! Loadgen CLI: drives an OTLP collector with synthetic traces, metrics
//! and logs.

use anyhow::Result;
use clap::Parser;
use loadgen::{LoadConfig, LoadRunner, ResultsReport};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "loadgen")]
#[command(about = "Telemetry load generator for collector backpressure testing", long_about = None)]
struct Args {
    /// Base configuration file (YAML); flags override its values
    #[arg(short, long, env = "LOADGEN_CONFIG")]
    config: Option<PathBuf>,

    /// OTLP/gRPC collector endpoint (default: localhost:4317)
    #[arg(long, env = "LOADGEN_ENDPOINT")]
    endpoint: Option<String>,

    /// Load scenario: burst, sustained, spike, rampup
    #[arg(short, long, env = "LOADGEN_SCENARIO")]
    scenario: Option<String>,

    /// Test duration, e.g. 60s or 5m
    #[arg(short, long, env = "LOADGEN_DURATION", value_parser = humantime::parse_duration)]
    duration: Option<Duration>,

    /// Number of concurrent workers
    #[arg(short, long, env = "LOADGEN_WORKERS")]
    workers: Option<usize>,

    /// Target units per second, across all workers
    #[arg(short, long, env = "LOADGEN_RATE")]
    rate: Option<u64>,

    /// Child units nested under each root
    #[arg(long, env = "LOADGEN_DEPTH")]
    depth: Option<usize>,

    /// Size of each attribute value in bytes
    #[arg(long, env = "LOADGEN_ATTR_SIZE")]
    attr_size: Option<usize>,

    /// Number of attributes per unit
    #[arg(long, env = "LOADGEN_ATTR_COUNT")]
    attr_count: Option<usize>,

    /// Send a per-tree counter metric
    #[arg(long, env = "LOADGEN_METRICS", num_args = 0..=1, default_missing_value = "true")]
    metrics: Option<bool>,

    /// Send one log record per tree
    #[arg(long, env = "LOADGEN_LOGS", num_args = 0..=1, default_missing_value = "true")]
    logs: Option<bool>,

    /// Unique UUID in every attribute value
    #[arg(long, env = "LOADGEN_HIGH_CARDINALITY", num_args = 0..=1, default_missing_value = "true")]
    high_cardinality: Option<bool>,

    /// Period of spike/rampup rate transitions
    #[arg(long, value_parser = humantime::parse_duration)]
    step_interval: Option<Duration>,

    /// Period of progress reports
    #[arg(long, value_parser = humantime::parse_duration)]
    progress_interval: Option<Duration>,

    /// Upper bound of the simulated per-child processing delay
    #[arg(long, value_parser = humantime::parse_duration)]
    max_child_delay: Option<Duration>,

    /// Budget for flushing the pipeline on exit
    #[arg(long, value_parser = humantime::parse_duration)]
    shutdown_timeout: Option<Duration>,

    /// Generate without sending anything
    #[arg(long)]
    dry_run: bool,

    /// Summary format: table (default), json
    #[arg(short, long, default_value = "table")]
    output: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Args {
    /// File values (or defaults), overridden by any flag that was given.
    fn into_config(self) -> Result<LoadConfig> {
        let mut config = match &self.config {
            Some(path) => LoadConfig::from_file(path)?,
            None => LoadConfig::default(),
        };

        if let Some(v) = self.endpoint {
            config.endpoint = v;
        }
        if let Some(v) = self.scenario {
            config.scenario = v;
        }
        if let Some(v) = self.duration {
            config.duration = v;
        }
        if let Some(v) = self.workers {
            config.workers = v;
        }
        if let Some(v) = self.rate {
            config.rate = v;
        }
        if let Some(v) = self.depth {
            config.depth = v;
        }
        if let Some(v) = self.attr_size {
            config.attr_size = v;
        }
        if let Some(v) = self.attr_count {
            config.attr_count = v;
        }
        if let Some(v) = self.metrics {
            config.metrics = v;
        }
        if let Some(v) = self.logs {
            config.logs = v;
        }
        if let Some(v) = self.high_cardinality {
            config.high_cardinality = v;
        }
        if let Some(v) = self.step_interval {
            config.step_interval = v;
        }
        if let Some(v) = self.progress_interval {
            config.progress_interval = v;
        }
        if let Some(v) = self.max_child_delay {
            config.max_child_delay = v;
        }
        if let Some(v) = self.shutdown_timeout {
            config.shutdown_timeout = v;
        }
        if self.dry_run {
            config.dry_run = true;
        }

        Ok(config)
    }
}

fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level, args.log_json)?;

    let output = args.output.clone();
    let config = args.into_config()?;

    // Unknown scenario and bad values abort here, before any connection.
    let runner = match LoadRunner::new(config) {
        Ok(runner) => runner,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    runner.log_banner();

    // Handle Ctrl+C
    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        cancel_on_signal.cancel();
    });

    let summary = runner.run(cancel).await?;

    match output.as_str() {
        "json" => println!("{}", ResultsReport::format_json(&summary)?),
        _ => println!("{}", ResultsReport::format_table(&summary)),
    }

    Ok(())
}
