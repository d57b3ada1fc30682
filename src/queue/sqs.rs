use async_trait::async_trait;
use aws_sdk_sqs::error::DisplayErrorContext;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use super::{CreateOutcome, QueueBackend, QueueMessage, cancellable};
use crate::errors::QueueError;
use crate::worker::QueueConfig;

/// [`QueueBackend`] over an AWS SQS queue.
///
/// The queue is addressed by name. If no URL is configured, it is resolved
/// with `GetQueueUrl` on first use and cached.
pub struct SqsQueue {
    /// The AWS SQS client used to interact with the SQS service.
    sqs_client: aws_sdk_sqs::Client,

    queue_name: String,

    queue_url: OnceCell<String>,

    /// Long poll duration for `ReceiveMessage`, in seconds.
    wait_time_seconds: i32,
}

impl SqsQueue {
    pub fn new(sqs_client: aws_sdk_sqs::Client, config: &QueueConfig) -> Self {
        SqsQueue {
            sqs_client,
            queue_name: config.queue_name.clone(),
            queue_url: OnceCell::new_with(config.queue_url.clone()),
            wait_time_seconds: config.wait_time_seconds,
        }
    }

    async fn queue_url(&self, cancel: &CancellationToken) -> Result<&str, QueueError> {
        let url = self
            .queue_url
            .get_or_try_init(|| async {
                let request = self
                    .sqs_client
                    .get_queue_url()
                    .queue_name(&self.queue_name)
                    .send();
                let output = cancellable(cancel, request).await?.map_err(|e| {
                    QueueError::ResolveUrl {
                        queue: self.queue_name.clone(),
                        reason: DisplayErrorContext(e).to_string(),
                    }
                })?;

                output
                    .queue_url()
                    .map(str::to_string)
                    .ok_or_else(|| QueueError::ResolveUrl {
                        queue: self.queue_name.clone(),
                        reason: "response carried no queue url".to_string(),
                    })
            })
            .await?;
        Ok(url.as_str())
    }

    fn remember_url(&self, url: Option<&str>) {
        if let Some(url) = url {
            // Already set means an earlier call resolved the same queue.
            let _ = self.queue_url.set(url.to_string());
        }
    }
}

#[async_trait]
impl QueueBackend for SqsQueue {
    fn name(&self) -> &str {
        &self.queue_name
    }

    async fn receive(&self, cancel: &CancellationToken) -> Result<Option<QueueMessage>, QueueError> {
        let queue_url = self.queue_url(cancel).await?;

        let request = self
            .sqs_client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(1)
            .wait_time_seconds(self.wait_time_seconds)
            .send();
        let output = cancellable(cancel, request)
            .await?
            .map_err(|e| QueueError::Receive(DisplayErrorContext(e).to_string()))?;

        let Some(message) = output.messages().first() else {
            return Ok(None);
        };

        let id = message
            .message_id()
            .ok_or_else(|| QueueError::MalformedMessage("missing message id".to_string()))?;
        let receipt_handle = message.receipt_handle().ok_or_else(|| {
            QueueError::MalformedMessage(format!("message {id} has no receipt handle"))
        })?;

        Ok(Some(QueueMessage::new(
            id,
            receipt_handle,
            message.body().unwrap_or_default(),
        )))
    }

    async fn delete(
        &self,
        id: &str,
        ack_token: &str,
        cancel: &CancellationToken,
    ) -> Result<(), QueueError> {
        let queue_url = self.queue_url(cancel).await?;

        let request = self
            .sqs_client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(ack_token)
            .send();
        cancellable(cancel, request)
            .await?
            .map_err(|e| QueueError::Delete {
                id: id.to_string(),
                reason: DisplayErrorContext(e).to_string(),
            })?;

        Ok(())
    }

    async fn create_if_not_exists(
        &self,
        cancel: &CancellationToken,
    ) -> Result<CreateOutcome, QueueError> {
        let request = self
            .sqs_client
            .get_queue_url()
            .queue_name(&self.queue_name)
            .send();
        let lookup = cancellable(cancel, request).await?;

        match lookup {
            Ok(output) => {
                self.remember_url(output.queue_url());
                Ok(CreateOutcome::AlreadyExisted)
            }
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_queue_does_not_exist()) =>
            {
                let request = self
                    .sqs_client
                    .create_queue()
                    .queue_name(&self.queue_name)
                    .send();
                let output = cancellable(cancel, request).await?.map_err(|e| {
                    QueueError::Create {
                        queue: self.queue_name.clone(),
                        reason: DisplayErrorContext(e).to_string(),
                    }
                })?;
                self.remember_url(output.queue_url());
                Ok(CreateOutcome::Created)
            }
            Err(err) => Err(QueueError::Create {
                queue: self.queue_name.clone(),
                reason: DisplayErrorContext(err).to_string(),
            }),
        }
    }
}
