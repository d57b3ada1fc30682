use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::errors::LifecycleError;
use crate::queue::{CreateOutcome, QueueBackend};
use crate::telemetry::Telemetry;

/// Setup and teardown hooks run once around the consumer loop.
///
/// `initialize` completes before the first receive; a failure there aborts
/// startup. `cleanup` runs after the loop has exited. Both default to no-ops.
#[async_trait]
pub trait QueueLifecycle: Send + Sync {
    async fn initialize(
        &self,
        _queue: &dyn QueueBackend,
        _cancel: &CancellationToken,
    ) -> Result<(), LifecycleError> {
        Ok(())
    }

    async fn cleanup(
        &self,
        _queue: &dyn QueueBackend,
        _cancel: &CancellationToken,
    ) -> Result<(), LifecycleError> {
        Ok(())
    }
}

/// Leaves the queue alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopQueueLifecycle;

impl QueueLifecycle for NoopQueueLifecycle {}

/// Creates the queue on startup if it does not exist yet.
#[derive(Debug, Clone, Default)]
pub struct CreateIfNotExistsQueueLifecycle {
    telemetry: Telemetry,
}

impl CreateIfNotExistsQueueLifecycle {
    pub fn new(telemetry: Telemetry) -> Self {
        CreateIfNotExistsQueueLifecycle { telemetry }
    }
}

#[async_trait]
impl QueueLifecycle for CreateIfNotExistsQueueLifecycle {
    async fn initialize(
        &self,
        queue: &dyn QueueBackend,
        cancel: &CancellationToken,
    ) -> Result<(), LifecycleError> {
        let span = self.telemetry.start_span("initialize");
        async {
            tracing::info!(queue = queue.name(), "Creating queue if it does not exist");
            let outcome = queue
                .create_if_not_exists(cancel)
                .await
                .map_err(LifecycleError::Initialize)?;
            match outcome {
                CreateOutcome::Created => tracing::info!(queue = queue.name(), "Queue created"),
                CreateOutcome::AlreadyExisted => {
                    tracing::info!(queue = queue.name(), "Queue already exists")
                }
            }
            Ok::<(), LifecycleError>(())
        }
        .instrument(span)
        .await
    }
}
