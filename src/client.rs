use aws_config::{BehaviorVersion, Region};

use crate::worker::QueueConfig;

/// Creates an AWS SQS client using credentials and configuration from the environment.
///
/// This function loads AWS configuration from environment variables such as:
/// - `AWS_ACCESS_KEY_ID`
/// - `AWS_SECRET_ACCESS_KEY`
/// - `AWS_REGION`
/// - `AWS_PROFILE`
///
/// # Returns
///
/// Returns a configured `aws_sdk_sqs::Client` ready for use.
pub async fn create_sqs_client_from_env() -> aws_sdk_sqs::Client {
    let config = aws_config::load_from_env().await;
    aws_sdk_sqs::Client::new(&config)
}

/// Creates an AWS SQS client from the environment, applying the region and
/// endpoint overrides in `config`.
///
/// # Example
///
/// ```rust,no_run
/// use sqs_queue_worker::{client::create_sqs_client, worker::QueueConfig};
///
/// #[tokio::main]
/// async fn main() {
///     let mut config = QueueConfig::new("orders");
///     config.endpoint_url = Some("http://localhost:4566".to_string());
///     let client = create_sqs_client(&config).await;
///     // Use the client...
/// }
/// ```
pub async fn create_sqs_client(config: &QueueConfig) -> aws_sdk_sqs::Client {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = &config.region {
        loader = loader.region(Region::new(region.clone()));
    }
    if let Some(endpoint_url) = &config.endpoint_url {
        loader = loader.endpoint_url(endpoint_url);
    }

    let sdk_config = loader.load().await;
    aws_sdk_sqs::Client::new(&sdk_config)
}
