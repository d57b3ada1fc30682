use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::errors::QueueError;

pub mod sqs;

pub use sqs::SqsQueue;

/// A single message received from the queue.
///
/// The worker must present both `id` and `ack_token` to delete it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Opaque message identifier.
    pub id: String,

    /// Pop receipt (SQS receipt handle) required for deletion.
    pub ack_token: String,

    /// Raw message body.
    pub payload: Vec<u8>,
}

impl QueueMessage {
    pub fn new(
        id: impl Into<String>,
        ack_token: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        QueueMessage {
            id: id.into(),
            ack_token: ack_token.into(),
            payload: payload.into(),
        }
    }
}

/// Result of [`QueueBackend::create_if_not_exists`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExisted,
}

/// Trait for the queue service the worker drains.
///
/// Every call receives the worker's cancellation token and must return
/// [`QueueError::Cancelled`] promptly once it fires instead of blocking past
/// shutdown.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Human readable queue name, used in log records.
    fn name(&self) -> &str;

    /// Waits for at most one message. `Ok(None)` means the queue was empty
    /// for the duration of the long poll.
    async fn receive(&self, cancel: &CancellationToken) -> Result<Option<QueueMessage>, QueueError>;

    /// Removes a received message from the queue.
    async fn delete(
        &self,
        id: &str,
        ack_token: &str,
        cancel: &CancellationToken,
    ) -> Result<(), QueueError>;

    /// Creates the queue, succeeding whether or not it already existed.
    async fn create_if_not_exists(
        &self,
        cancel: &CancellationToken,
    ) -> Result<CreateOutcome, QueueError>;
}

/// Races `fut` against `cancel`, returning [`QueueError::Cancelled`] if the
/// token fires first. An already fired token wins without polling `fut`.
pub async fn cancellable<F>(cancel: &CancellationToken, fut: F) -> Result<F::Output, QueueError>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(QueueError::Cancelled),
        output = fut => Ok(output),
    }
}
