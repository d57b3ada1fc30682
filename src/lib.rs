//! # SQS Queue Worker
//!
//! A long-running worker that drains an AWS SQS queue one message at a time:
//! receive, delete, decode, then report the message through `tracing` and a
//! `messages_received` counter.
//!
//! ## Features
//!
//! - Asynchronous SQS long polling with tokio, cancellable at any await point
//! - Pluggable body decoding (identity or base64)
//! - Optional create-queue-if-absent lifecycle hook
//! - Continue-on-error semantics: a bad message never stops the worker
//! - Fixed idle delay after an empty receive
//!
//! Messages are deleted before they are decoded. Delivery is at most once.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sqs_queue_worker::{
//!     client::create_sqs_client, queue::SqsQueue, telemetry::Telemetry,
//!     worker::{Worker, WorkerConfig},
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WorkerConfig::from_env()?;
//!     let client = create_sqs_client(&config.queue).await;
//!     let queue = SqsQueue::new(client, &config.queue);
//!     let worker = Worker::from_config(queue, &config, Telemetry::new());
//!
//!     let cancel = CancellationToken::new();
//!     worker.run(cancel).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod decoder;
pub mod errors;
pub mod lifecycle;
pub mod queue;
pub mod telemetry;
pub mod worker;
