use std::string::FromUtf8Error;

use thiserror::Error;

/// Error types for queue backend operations.
///
/// Every SDK failure is flattened into a string rendered with the SDK's
/// `DisplayErrorContext`, so the variant tells *which* call failed and the
/// payload tells why.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The cancellation token fired while the call was in flight.
    #[error("queue operation cancelled")]
    Cancelled,

    /// The queue URL could not be resolved from the queue name.
    #[error("failed to resolve queue url for {queue}: {reason}")]
    ResolveUrl { queue: String, reason: String },

    #[error("failed to receive message: {0}")]
    Receive(String),

    #[error("failed to delete message {id}: {reason}")]
    Delete { id: String, reason: String },

    #[error("failed to create queue {queue}: {reason}")]
    Create { queue: String, reason: String },

    /// The backend returned a message without the fields needed to delete it.
    #[error("received malformed message: {0}")]
    MalformedMessage(String),
}

/// Error returned when a message body cannot be turned into text.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("decoded payload is not valid UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),
}

/// Failure of a one-shot lifecycle hook.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("queue initialization failed: {0}")]
    Initialize(#[source] QueueError),

    #[error("queue cleanup failed: {0}")]
    Cleanup(#[source] QueueError),
}

/// Error types surfaced by the consumer loop.
///
/// Only `Lifecycle` (and `AlreadyStarted`/`Task` from the host surface) ever
/// escapes [`Worker::run`](crate::worker::Worker::run); the others are
/// handled inside the loop, one iteration at a time.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Shutdown was requested. Not a failure.
    #[error("worker cancelled")]
    Cancelled,

    #[error("worker has already been started")]
    AlreadyStarted,

    #[error(transparent)]
    Queue(QueueError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// The spawned worker task panicked or was aborted.
    #[error("worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<QueueError> for WorkerError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Cancelled => WorkerError::Cancelled,
            other => WorkerError::Queue(other),
        }
    }
}

/// Error raised while reading [`WorkerConfig`](crate::worker::WorkerConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration key {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Error raised while installing the tracing subscriber or metrics exporter.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(String),

    #[error("failed to install trace exporter: {0}")]
    Tracer(String),

    #[error("failed to install metrics exporter: {0}")]
    Metrics(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_queue_error_maps_to_worker_cancellation() {
        assert!(matches!(
            WorkerError::from(QueueError::Cancelled),
            WorkerError::Cancelled
        ));
        assert!(matches!(
            WorkerError::from(QueueError::Receive("timeout".into())),
            WorkerError::Queue(QueueError::Receive(_))
        ));
    }
}
