#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqs_queue_worker::errors::{LifecycleError, QueueError};
use sqs_queue_worker::lifecycle::QueueLifecycle;
use sqs_queue_worker::queue::{CreateOutcome, QueueBackend, QueueMessage};
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::span::{Attributes, Id};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// What the next `receive` call returns.
pub enum Step {
    Message(QueueMessage),
    Empty,
    Fail(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Receive,
    Delete { id: String, ack_token: String },
    Create,
}

impl Call {
    pub fn delete(id: &str, ack_token: &str) -> Self {
        Call::Delete {
            id: id.to_string(),
            ack_token: ack_token.to_string(),
        }
    }
}

/// In-memory queue that replays a fixed script of receive results.
///
/// Once the script runs out, `receive` parks until the worker is cancelled.
#[derive(Clone, Default)]
pub struct ScriptedQueue {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    script: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<Call>>,
    receive_times: Mutex<Vec<Instant>>,
    failing_deletes: Mutex<HashSet<String>>,
    create_result: Mutex<Option<Result<CreateOutcome, String>>>,
    drained: Notify,
}

impl ScriptedQueue {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        let queue = ScriptedQueue::default();
        queue.inner.script.lock().unwrap().extend(steps);
        queue
    }

    pub fn fail_delete_of(self, id: &str) -> Self {
        self.inner.failing_deletes.lock().unwrap().insert(id.to_string());
        self
    }

    pub fn create_returns(self, result: Result<CreateOutcome, &str>) -> Self {
        *self.inner.create_result.lock().unwrap() = Some(result.map_err(str::to_string));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.calls.lock().unwrap().clone()
    }

    pub fn receive_times(&self) -> Vec<Instant> {
        self.inner.receive_times.lock().unwrap().clone()
    }

    /// Resolves once `receive` has been called with the script exhausted.
    pub async fn wait_drained(&self) {
        self.inner.drained.notified().await;
    }

    fn record(&self, call: Call) {
        self.inner.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl QueueBackend for ScriptedQueue {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn receive(&self, cancel: &CancellationToken) -> Result<Option<QueueMessage>, QueueError> {
        self.record(Call::Receive);
        self.inner.receive_times.lock().unwrap().push(Instant::now());

        let step = self.inner.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Message(message)) => Ok(Some(message)),
            Some(Step::Empty) => Ok(None),
            Some(Step::Fail(reason)) => Err(QueueError::Receive(reason.to_string())),
            None => {
                self.inner.drained.notify_one();
                cancel.cancelled().await;
                Err(QueueError::Cancelled)
            }
        }
    }

    async fn delete(
        &self,
        id: &str,
        ack_token: &str,
        _cancel: &CancellationToken,
    ) -> Result<(), QueueError> {
        self.record(Call::delete(id, ack_token));
        if self.inner.failing_deletes.lock().unwrap().contains(id) {
            return Err(QueueError::Delete {
                id: id.to_string(),
                reason: "receipt handle expired".to_string(),
            });
        }
        Ok(())
    }

    async fn create_if_not_exists(
        &self,
        _cancel: &CancellationToken,
    ) -> Result<CreateOutcome, QueueError> {
        self.record(Call::Create);
        let result = self
            .inner
            .create_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(Ok(CreateOutcome::Created));
        result.map_err(|reason| QueueError::Create {
            queue: "scripted".to_string(),
            reason,
        })
    }
}

/// Lifecycle that counts its invocations.
#[derive(Clone, Default)]
pub struct CountingLifecycle {
    pub initialized: Arc<AtomicUsize>,
    pub cleaned_up: Arc<AtomicUsize>,
    pub fail_cleanup: bool,
}

impl CountingLifecycle {
    pub fn initialize_count(&self) -> usize {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn cleanup_count(&self) -> usize {
        self.cleaned_up.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueueLifecycle for CountingLifecycle {
    async fn initialize(
        &self,
        _queue: &dyn QueueBackend,
        _cancel: &CancellationToken,
    ) -> Result<(), LifecycleError> {
        self.initialized.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn cleanup(
        &self,
        _queue: &dyn QueueBackend,
        _cancel: &CancellationToken,
    ) -> Result<(), LifecycleError> {
        self.cleaned_up.fetch_add(1, Ordering::SeqCst);
        if self.fail_cleanup {
            return Err(LifecycleError::Cleanup(QueueError::Delete {
                id: "cleanup".to_string(),
                reason: "backend unavailable".to_string(),
            }));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
    pub fields: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct CapturedSpan {
    pub name: String,
    pub fields: HashMap<String, String>,
}

/// `tracing` layer that keeps every event and span it sees.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
    spans: Arc<Mutex<Vec<CapturedSpan>>>,
}

impl CapturedLogs {
    /// Installs the capture as the default subscriber for the current thread.
    pub fn install(&self) -> DefaultGuard {
        tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn at_level(&self, level: Level) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.level == level)
            .collect()
    }

    pub fn with_message(&self, message: &str) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.message == message)
            .collect()
    }

    pub fn spans(&self) -> Vec<CapturedSpan> {
        self.spans.lock().unwrap().clone()
    }

    /// Spans opened for `operation`, matched on their `otel.name` field.
    pub fn spans_for(&self, operation: &str) -> Vec<CapturedSpan> {
        self.spans()
            .into_iter()
            .filter(|s| s.fields.get("otel.name").is_some_and(|n| n == operation))
            .collect()
    }
}

impl<S> Layer<S> for CapturedLogs
where
    S: Subscriber,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        attrs.record(&mut visitor);
        self.spans.lock().unwrap().push(CapturedSpan {
            name: attrs.metadata().name().to_string(),
            fields: visitor.fields,
        });
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: HashMap<String, String>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, format!("{value:?}"));
    }
}
