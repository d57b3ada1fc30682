use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::decoder::BodyDecoder;
use crate::errors::WorkerError;
use crate::lifecycle::QueueLifecycle;
use crate::queue::{QueueBackend, cancellable};
use crate::telemetry::{Telemetry, utc_timestamp};

mod config;

pub use config::{DEFAULT_IDLE_DELAY, MAX_WAIT_TIME_SECONDS, QueueConfig, WorkerConfig};

/// Where a [`Worker`] is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    /// Running the lifecycle's `initialize` hook.
    Starting,
    /// Inside the receive/delete/decode cycle.
    Running,
    /// The cycle has exited; running `cleanup`.
    Stopping,
    Stopped,
}

/// Consumer loop draining a single queue.
///
/// One message is in flight at a time. Each received message is deleted
/// before it is decoded, so a payload that fails to decode is dropped with an
/// error record as the only trace.
pub struct Worker<Q> {
    queue: Q,
    decoder: BodyDecoder,
    lifecycle: Box<dyn QueueLifecycle>,
    telemetry: Telemetry,
    idle_delay: Duration,
    state: watch::Sender<RunState>,
}

impl<Q> Worker<Q>
where
    Q: QueueBackend,
{
    pub fn new(
        queue: Q,
        decoder: BodyDecoder,
        lifecycle: Box<dyn QueueLifecycle>,
        telemetry: Telemetry,
    ) -> Self {
        let (state, _) = watch::channel(RunState::NotStarted);
        Worker {
            queue,
            decoder,
            lifecycle,
            telemetry,
            idle_delay: DEFAULT_IDLE_DELAY,
            state,
        }
    }

    /// Builds a worker with the decoder, lifecycle and idle delay selected by
    /// `config`.
    pub fn from_config(queue: Q, config: &WorkerConfig, telemetry: Telemetry) -> Self {
        let lifecycle = config.lifecycle(&telemetry);
        Worker::new(queue, config.decoder(), lifecycle, telemetry).with_idle_delay(config.idle_delay)
    }

    pub fn with_idle_delay(mut self, idle_delay: Duration) -> Self {
        self.idle_delay = idle_delay;
        self
    }

    pub fn state(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    /// Runs the worker until `cancel` fires.
    ///
    /// Only lifecycle failures are returned. A failed `initialize` stops the
    /// worker before its first receive; every error inside the loop is logged
    /// and the loop moves on to the next message.
    ///
    /// A worker runs once. Later calls return [`WorkerError::AlreadyStarted`].
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), WorkerError> {
        let claimed = self.state.send_if_modified(|state| {
            if *state == RunState::NotStarted {
                *state = RunState::Starting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(WorkerError::AlreadyStarted);
        }

        tracing::info!(queue = self.queue.name(), time = %utc_timestamp(), "Worker starting");

        if let Err(err) = self.lifecycle.initialize(&self.queue, &cancel).await {
            tracing::error!(
                queue = self.queue.name(),
                error = %err,
                time = %utc_timestamp(),
                "Worker failed to start"
            );
            self.state.send_replace(RunState::Stopped);
            return Err(err.into());
        }

        self.state.send_replace(RunState::Running);
        tracing::info!(queue = self.queue.name(), time = %utc_timestamp(), "Worker running");

        while !cancel.is_cancelled() {
            let span = self.telemetry.start_span("execute");
            let outcome = self.execute(&cancel).instrument(span.clone()).await;
            span.in_scope(|| match outcome {
                Ok(()) => {}
                Err(WorkerError::Cancelled) => {
                    tracing::debug!("Shutting down due to cancellation");
                }
                Err(err) => {
                    tracing::error!(error = %err, time = %utc_timestamp(), "Error processing event");
                }
            });
        }

        self.state.send_replace(RunState::Stopping);
        tracing::info!(queue = self.queue.name(), time = %utc_timestamp(), "Worker shutting down");

        // The run token has fired by now; cleanup gets one of its own.
        let cleanup = self
            .lifecycle
            .cleanup(&self.queue, &CancellationToken::new())
            .await;
        self.state.send_replace(RunState::Stopped);

        match cleanup {
            Ok(()) => {
                tracing::info!(queue = self.queue.name(), time = %utc_timestamp(), "Worker stopped");
                Ok(())
            }
            Err(err) => {
                tracing::error!(
                    queue = self.queue.name(),
                    error = %err,
                    time = %utc_timestamp(),
                    "Worker stopped with cleanup failure"
                );
                Err(err.into())
            }
        }
    }

    /// One iteration: receive, delete, count, decode, emit.
    async fn execute(&self, cancel: &CancellationToken) -> Result<(), WorkerError> {
        let Some(message) = self.queue.receive(cancel).await? else {
            return self.idle(cancel).await;
        };

        self.queue
            .delete(&message.id, &message.ack_token, cancel)
            .await?;
        self.telemetry.increment_messages_received();

        let text = self.decoder.decode(&message.payload)?;
        tracing::info!(message_id = %message.id, body = %text, "Message received");
        Ok(())
    }

    async fn idle(&self, cancel: &CancellationToken) -> Result<(), WorkerError> {
        cancellable(cancel, tokio::time::sleep(self.idle_delay)).await?;
        Ok(())
    }
}

impl<Q> Worker<Q>
where
    Q: QueueBackend + 'static,
{
    /// Spawns [`Worker::run`] onto the tokio runtime.
    pub fn start(self) -> WorkerHandle {
        let cancel = CancellationToken::new();
        let state = self.state();
        let token = cancel.clone();
        let task = tokio::spawn(async move { self.run(token).await });

        WorkerHandle {
            cancel,
            state,
            task,
        }
    }
}

/// Host-side control of a spawned [`Worker`].
pub struct WorkerHandle {
    cancel: CancellationToken,
    state: watch::Receiver<RunState>,
    task: JoinHandle<Result<(), WorkerError>>,
}

impl WorkerHandle {
    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    /// A receiver that observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.clone()
    }

    /// Signals cancellation and waits for the worker to finish cleanup.
    pub async fn stop(self) -> Result<(), WorkerError> {
        self.cancel.cancel();
        self.wait().await
    }

    /// Waits for the worker to finish without signalling it.
    pub async fn wait(self) -> Result<(), WorkerError> {
        self.task.await?
    }
}
