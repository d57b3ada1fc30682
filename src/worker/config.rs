use std::time::Duration;

use crate::decoder::BodyDecoder;
use crate::errors::ConfigError;
use crate::lifecycle::{CreateIfNotExistsQueueLifecycle, NoopQueueLifecycle, QueueLifecycle};
use crate::telemetry::{Telemetry, TelemetryConfig};

/// Longest long-poll SQS accepts.
pub const MAX_WAIT_TIME_SECONDS: i32 = 20;

/// Delay applied after a receive that returned no message.
pub const DEFAULT_IDLE_DELAY: Duration = Duration::from_secs(5);

/// Connection settings for the SQS queue.
///
/// # Fields
/// - `queue_name`: Name of the queue to drain. Also used by create-if-absent.
/// - `queue_url`: Skips `GetQueueUrl` when set.
/// - `region`: Overrides the region from the AWS environment chain.
/// - `endpoint_url`: Overrides the SQS endpoint, e.g. for LocalStack.
/// - `wait_time_seconds`: The wait time for long polling, in seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub queue_name: String,
    pub queue_url: Option<String>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub wait_time_seconds: i32,
}

impl QueueConfig {
    pub fn new(queue_name: impl Into<String>) -> Self {
        QueueConfig {
            queue_name: queue_name.into(),
            queue_url: None,
            region: None,
            endpoint_url: None,
            wait_time_seconds: MAX_WAIT_TIME_SECONDS,
        }
    }
}

/// Boot-time configuration of the worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub queue: QueueConfig,

    /// Decode message bodies as base64 (the default) or use them as-is.
    pub decode_base64: bool,

    /// Create the queue on startup if it does not exist.
    pub create_queue_if_not_exists: bool,

    pub idle_delay: Duration,

    pub telemetry: TelemetryConfig,
}

impl WorkerConfig {
    pub fn new(queue: QueueConfig) -> Self {
        WorkerConfig {
            queue,
            decode_base64: true,
            create_queue_if_not_exists: false,
            idle_delay: DEFAULT_IDLE_DELAY,
            telemetry: TelemetryConfig::default(),
        }
    }

    /// Reads the configuration from process environment variables.
    ///
    /// See [`WorkerConfig::from_lookup`] for the keys.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// | key | default |
    /// |---|---|
    /// | `WORKER_QUEUE_NAME` | required |
    /// | `WORKER_QUEUE_URL` | resolved from the name |
    /// | `WORKER_REGION` | AWS environment chain |
    /// | `WORKER_ENDPOINT_URL` | SDK default |
    /// | `WORKER_WAIT_TIME_SECONDS` | `20` |
    /// | `WORKER_DECODE_BASE64` | `true` |
    /// | `WORKER_CREATE_QUEUE` | `false` |
    /// | `WORKER_IDLE_DELAY_SECS` | `5` |
    /// | `WORKER_LOG_FORMAT` | `pretty` |
    /// | `WORKER_TRACE_EXPORTER` | `stdout` |
    /// | `WORKER_METRICS_ADDR` | no exporter |
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let queue_name = get("WORKER_QUEUE_NAME").ok_or(ConfigError::Missing("WORKER_QUEUE_NAME"))?;
        let mut queue = QueueConfig::new(queue_name);
        queue.queue_url = get("WORKER_QUEUE_URL");
        queue.region = get("WORKER_REGION");
        queue.endpoint_url = get("WORKER_ENDPOINT_URL");

        if let Some(raw) = get("WORKER_WAIT_TIME_SECONDS") {
            let seconds: i32 = parse("WORKER_WAIT_TIME_SECONDS", &raw)?;
            if !(0..=MAX_WAIT_TIME_SECONDS).contains(&seconds) {
                return Err(ConfigError::Invalid {
                    key: "WORKER_WAIT_TIME_SECONDS",
                    value: raw,
                    reason: format!("must be between 0 and {MAX_WAIT_TIME_SECONDS}"),
                });
            }
            queue.wait_time_seconds = seconds;
        }

        let mut config = WorkerConfig::new(queue);

        if let Some(raw) = get("WORKER_DECODE_BASE64") {
            config.decode_base64 = parse_bool("WORKER_DECODE_BASE64", &raw)?;
        }
        if let Some(raw) = get("WORKER_CREATE_QUEUE") {
            config.create_queue_if_not_exists = parse_bool("WORKER_CREATE_QUEUE", &raw)?;
        }
        if let Some(raw) = get("WORKER_IDLE_DELAY_SECS") {
            config.idle_delay = Duration::from_secs(parse("WORKER_IDLE_DELAY_SECS", &raw)?);
        }
        if let Some(raw) = get("WORKER_LOG_FORMAT") {
            config.telemetry.log_format = parse("WORKER_LOG_FORMAT", &raw)?;
        }
        if let Some(raw) = get("WORKER_TRACE_EXPORTER") {
            config.telemetry.trace_exporter = parse("WORKER_TRACE_EXPORTER", &raw)?;
        }
        if let Some(raw) = get("WORKER_METRICS_ADDR") {
            config.telemetry.metrics_addr = Some(parse("WORKER_METRICS_ADDR", &raw)?);
        }

        Ok(config)
    }

    /// The decoder selected by `decode_base64`.
    pub fn decoder(&self) -> BodyDecoder {
        BodyDecoder::from_flag(self.decode_base64)
    }

    /// The lifecycle selected by `create_queue_if_not_exists`.
    pub fn lifecycle(&self, telemetry: &Telemetry) -> Box<dyn QueueLifecycle> {
        if self.create_queue_if_not_exists {
            Box::new(CreateIfNotExistsQueueLifecycle::new(telemetry.clone()))
        } else {
            Box::new(NoopQueueLifecycle)
        }
    }
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
