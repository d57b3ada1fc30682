//! Tracing and metrics for the worker.
//!
//! [`Telemetry`] is the handle the worker emits through: one span per loop
//! iteration and one counter increment per received message. Subscriber and
//! exporter installation happens once, in the host, via [`init`]; spans go to
//! the OpenTelemetry exporter picked by [`TraceExporter`].

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics_exporter_prometheus::PrometheusBuilder;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{KeyValue, global};
use opentelemetry_sdk::{Resource, trace as sdktrace};
use tracing::Span;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::errors::TelemetryError;

/// Service name attached to every span.
pub const SERVICE_NAME: &str = "queue-worker";

/// Name of the received-messages counter.
pub const MESSAGES_RECEIVED: &str = "messages_received";

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format {other:?}, expected pretty or json")),
        }
    }
}

/// Where spans are exported.
///
/// The OTLP exporter honours the standard `OTEL_EXPORTER_OTLP_ENDPOINT`
/// variable (gRPC, `http://localhost:4317` by default).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraceExporter {
    /// Spans stay in-process and only feed the log output.
    None,
    /// Spans are printed to stdout as they end.
    #[default]
    Stdout,
    Otlp,
}

impl FromStr for TraceExporter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(TraceExporter::None),
            "stdout" | "console" => Ok(TraceExporter::Stdout),
            "otlp" => Ok(TraceExporter::Otlp),
            other => Err(format!(
                "unknown trace exporter {other:?}, expected none, stdout or otlp"
            )),
        }
    }
}

/// Telemetry settings read at boot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub log_format: LogFormat,

    pub trace_exporter: TraceExporter,

    /// Address of the Prometheus scrape endpoint. No exporter when unset.
    pub metrics_addr: Option<SocketAddr>,
}

/// Span factory and message counter shared by the worker.
///
/// Cloning is cheap and clones share the same counter. Nothing here can fail:
/// with no subscriber or recorder installed, spans and increments are no-ops
/// apart from the local tally.
#[derive(Debug, Clone, Default)]
pub struct Telemetry {
    messages_received: Arc<AtomicU64>,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a span for one unit of work named `operation`. Exporters see
    /// `operation` as the span name.
    pub fn start_span(&self, operation: &'static str) -> Span {
        tracing::info_span!("worker", otel.name = operation, service = SERVICE_NAME)
    }

    pub fn increment_messages_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(MESSAGES_RECEIVED).increment(1);
    }

    /// Messages counted by this handle and its clones.
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }
}

/// Current UTC time as `2024-01-31 13:45:00Z`.
pub fn utc_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%SZ").to_string()
}

/// Installs the global tracing subscriber and, if configured, the Prometheus
/// exporter, then returns a fresh [`Telemetry`] handle.
///
/// Must be called from within a tokio runtime when `metrics_addr` is set.
pub fn init(config: &TelemetryConfig) -> Result<Telemetry, TelemetryError> {
    init_tracing(config)?;
    if let Some(addr) = config.metrics_addr {
        install_metrics_exporter(addr)?;
    }
    Ok(Telemetry::new())
}

/// Flushes pending spans. Call once before the process exits.
pub fn shutdown() {
    global::shutdown_tracer_provider();
}

/// Installs the `tracing` subscriber with the configured log format and
/// trace exporter. The filter comes from `RUST_LOG` and defaults to `info`.
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let otel = match config.trace_exporter {
        TraceExporter::None => None,
        TraceExporter::Stdout => Some(stdout_tracer()),
        TraceExporter::Otlp => Some(otlp_tracer()?),
    }
    .map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

    let registry = tracing_subscriber::registry().with(filter).with(otel);

    let result = match config.log_format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init(),
    };
    result.map_err(|e| TelemetryError::Subscriber(e.to_string()))
}

fn resource() -> Resource {
    Resource::new(vec![KeyValue::new("service.name", SERVICE_NAME)])
}

fn stdout_tracer() -> sdktrace::Tracer {
    let provider = sdktrace::TracerProvider::builder()
        .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
        .with_config(sdktrace::config().with_resource(resource()))
        .build();
    let tracer = provider.tracer(SERVICE_NAME);
    global::set_tracer_provider(provider);
    tracer
}

fn otlp_tracer() -> Result<sdktrace::Tracer, TelemetryError> {
    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(opentelemetry_otlp::new_exporter().tonic())
        .with_trace_config(sdktrace::config().with_resource(resource()))
        .install_batch(opentelemetry_sdk::runtime::Tokio)
        .map_err(|e| TelemetryError::Tracer(e.to_string()))
}

fn install_metrics_exporter(addr: SocketAddr) -> Result<(), TelemetryError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;

    metrics::describe_counter!(MESSAGES_RECEIVED, "Counts the number of received messages");
    tracing::info!(%addr, "Metrics exporter listening");
    Ok(())
}
