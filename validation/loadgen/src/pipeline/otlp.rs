//! OTLP/gRPC pipeline client built on the OpenTelemetry SDK.

use super::{LogEntry, PipelineClient, Severity, Tag};
use crate::attributes::AttributeSet;
use crate::config::LoadConfig;
use crate::error::{LoadgenError, LoadgenResult};
use crate::generator::TREES_GENERATED_METRIC;
use async_trait::async_trait;
use opentelemetry::logs::{
    AnyValue, LogRecord as _, Logger as _, LoggerProvider as _, Severity as OtelSeverity,
};
use opentelemetry::metrics::{Counter, Meter, MeterProvider as _};
use opentelemetry::trace::{TraceContextExt, Tracer as _, TracerProvider as _};
use opentelemetry::{Context, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::logs::{self as sdklogs, BatchLogProcessor, LoggerProvider};
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::{self as sdktrace, BatchSpanProcessor, TracerProvider};
use opentelemetry_sdk::{runtime, Resource};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

const SERVICE_NAME: &str = "loadgen";
const SERVICE_VERSION: &str = "1.0.0";

// Small, frequent batches keep large-attribute exports under the 4MiB gRPC
// message limit.
const MAX_QUEUE_SIZE: usize = 4096;
const MAX_EXPORT_BATCH_SIZE: usize = 32;
const BATCH_DELAY: Duration = Duration::from_millis(50);
const METRIC_INTERVAL: Duration = Duration::from_secs(1);

/// Pipeline client exporting traces, metrics and logs over OTLP/gRPC.
pub struct OtlpPipeline {
    tracer_provider: TracerProvider,
    tracer: sdktrace::Tracer,
    meter_provider: Option<SdkMeterProvider>,
    meter: Option<Meter>,
    counters: HashMap<&'static str, Counter<u64>>,
    logger_provider: Option<LoggerProvider>,
    logger: Option<sdklogs::Logger>,
}

impl OtlpPipeline {
    /// Build exporters and providers. Must run inside a tokio runtime.
    ///
    /// The meter and logger providers are only created when the matching
    /// toggle is on.
    pub fn connect(config: &LoadConfig) -> LoadgenResult<Self> {
        let endpoint = config.endpoint_url();
        let resource = Resource::new(vec![
            KeyValue::new("service.name", SERVICE_NAME),
            KeyValue::new("service.version", SERVICE_VERSION),
        ]);

        let tracer_provider = init_tracer_provider(&endpoint, resource.clone())?;
        let tracer = tracer_provider.tracer(SERVICE_NAME);

        let (meter_provider, meter, counters) = if config.metrics {
            let provider = init_meter_provider(&endpoint, resource.clone())?;
            let meter = provider.meter(SERVICE_NAME);
            let mut counters = HashMap::new();
            counters.insert(
                TREES_GENERATED_METRIC,
                meter.u64_counter(TREES_GENERATED_METRIC).build(),
            );
            (Some(provider), Some(meter), counters)
        } else {
            (None, None, HashMap::new())
        };

        let (logger_provider, logger) = if config.logs {
            let provider = init_logger_provider(&endpoint, resource)?;
            let logger = provider.logger(SERVICE_NAME);
            (Some(provider), Some(logger))
        } else {
            (None, None)
        };

        info!(
            endpoint = %endpoint,
            metrics = meter_provider.is_some(),
            logs = logger_provider.is_some(),
            "OTLP pipeline initialized"
        );

        Ok(Self {
            tracer_provider,
            tracer,
            meter_provider,
            meter,
            counters,
            logger_provider,
            logger,
        })
    }
}

fn init_tracer_provider(endpoint: &str, resource: Resource) -> LoadgenResult<TracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| LoadgenError::PipelineInit(format!("failed to create trace exporter: {}", e)))?;

    let processor = BatchSpanProcessor::builder(exporter, runtime::Tokio)
        .with_batch_config(
            sdktrace::BatchConfigBuilder::default()
                .with_max_queue_size(MAX_QUEUE_SIZE)
                .with_max_export_batch_size(MAX_EXPORT_BATCH_SIZE)
                .with_scheduled_delay(BATCH_DELAY)
                .build(),
        )
        .build();

    #[allow(deprecated)]
    let provider = TracerProvider::builder()
        .with_config(sdktrace::Config::default().with_resource(resource))
        .with_span_processor(processor)
        .build();

    Ok(provider)
}

fn init_meter_provider(endpoint: &str, resource: Resource) -> LoadgenResult<SdkMeterProvider> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| {
            LoadgenError::PipelineInit(format!("failed to create metric exporter: {}", e))
        })?;

    let reader = PeriodicReader::builder(exporter, runtime::Tokio)
        .with_interval(METRIC_INTERVAL)
        .build();

    Ok(SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader)
        .build())
}

fn init_logger_provider(endpoint: &str, resource: Resource) -> LoadgenResult<LoggerProvider> {
    let exporter = opentelemetry_otlp::LogExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| LoadgenError::PipelineInit(format!("failed to create log exporter: {}", e)))?;

    let processor = BatchLogProcessor::builder(exporter, runtime::Tokio)
        .with_batch_config(
            sdklogs::BatchConfigBuilder::default()
                .with_max_queue_size(MAX_QUEUE_SIZE)
                .with_max_export_batch_size(MAX_EXPORT_BATCH_SIZE)
                .with_scheduled_delay(BATCH_DELAY)
                .build(),
        )
        .build();

    Ok(LoggerProvider::builder()
        .with_resource(resource)
        .with_log_processor(processor)
        .build())
}

fn key_values(attributes: &AttributeSet) -> Vec<KeyValue> {
    attributes
        .iter()
        .map(|a| KeyValue::new(a.name.clone(), a.value.clone()))
        .collect()
}

fn otel_severity(severity: Severity) -> OtelSeverity {
    match severity {
        Severity::Debug => OtelSeverity::Debug,
        Severity::Info => OtelSeverity::Info,
        Severity::Warn => OtelSeverity::Warn,
        Severity::Error => OtelSeverity::Error,
    }
}

#[async_trait]
impl PipelineClient for OtlpPipeline {
    type Context = Context;
    type Unit = Context;

    fn root_context(&self) -> Context {
        Context::new()
    }

    fn start_unit(
        &self,
        parent: &Context,
        name: String,
        attributes: &AttributeSet,
    ) -> (Context, Context) {
        let span = self
            .tracer
            .span_builder(name)
            .with_attributes(key_values(attributes))
            .start_with_context(&self.tracer, parent);
        let cx = parent.with_span(span);
        (cx.clone(), cx)
    }

    fn end_unit(&self, unit: Context) {
        unit.span().end();
    }

    fn increment_counter(&self, metric: &'static str, delta: u64, tags: &[Tag]) {
        let Some(meter) = &self.meter else {
            return;
        };
        let tags: Vec<KeyValue> = tags.iter().map(|(k, v)| KeyValue::new(*k, *v)).collect();
        match self.counters.get(metric) {
            Some(counter) => counter.add(delta, &tags),
            None => {
                debug!(metric, "Building unregistered counter");
                meter.u64_counter(metric).build().add(delta, &tags);
            }
        }
    }

    fn emit_log_record(&self, context: &Context, entry: LogEntry<'_>) {
        let Some(logger) = &self.logger else {
            return;
        };
        let mut record = logger.create_log_record();
        record.set_timestamp(entry.timestamp);
        record.set_severity_number(otel_severity(entry.severity));
        record.set_severity_text(entry.severity.as_str());
        record.set_body(AnyValue::from(entry.body));
        record.add_attributes(
            entry
                .attributes
                .iter()
                .map(|a| (a.name.clone(), AnyValue::from(a.value.clone()))),
        );

        // Correlate the record with the tree it belongs to.
        let _guard = context.clone().attach();
        logger.emit(record);
    }

    async fn shutdown(&self, timeout: Duration) -> LoadgenResult<()> {
        let tracer_provider = self.tracer_provider.clone();
        let meter_provider = self.meter_provider.clone();
        let logger_provider = self.logger_provider.clone();

        // Provider shutdown blocks until the batch processors drain.
        let flush = tokio::task::spawn_blocking(move || {
            let mut failures = Vec::new();
            if let Some(provider) = logger_provider {
                if let Err(e) = provider.shutdown() {
                    failures.push(format!("logger provider: {}", e));
                }
            }
            if let Some(provider) = meter_provider {
                if let Err(e) = provider.shutdown() {
                    failures.push(format!("meter provider: {}", e));
                }
            }
            if let Err(e) = tracer_provider.shutdown() {
                failures.push(format!("tracer provider: {}", e));
            }
            failures
        });

        match tokio::time::timeout(timeout, flush).await {
            Err(_) => Err(LoadgenError::ShutdownTimeout(timeout)),
            Ok(Err(join)) => Err(LoadgenError::Shutdown(join.to_string())),
            Ok(Ok(failures)) if failures.is_empty() => Ok(()),
            Ok(Ok(failures)) => Err(LoadgenError::Shutdown(failures.join("; "))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeFactory;

    #[test]
    fn test_key_values_preserve_order() {
        let set = AttributeFactory::new(3, 2, false).build(0);
        let kvs = key_values(&set);
        let keys: Vec<_> = kvs.iter().map(|kv| kv.key.as_str().to_string()).collect();
        assert_eq!(keys, vec!["attr_0", "attr_1", "attr_2"]);
    }

    #[test]
    fn test_severity_mapping() {
        assert_eq!(otel_severity(Severity::Info), OtelSeverity::Info);
        assert_eq!(otel_severity(Severity::Error), OtelSeverity::Error);
    }
}
