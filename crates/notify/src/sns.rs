//! AWS SNS sink.
//!
//! Publishes alerts to the topic ARN given as the routing destination.

use aws_sdk_sns::error::DisplayErrorContext;

use crate::traits::{NotifyError, Sink};

/// SNS rejects subjects longer than this.
const MAX_SUBJECT_CHARS: usize = 100;

/// Publishes alerts to SNS topics.
#[derive(Debug, Clone)]
pub struct SnsSink {
    client: aws_sdk_sns::Client,
}

impl SnsSink {
    pub fn new(client: aws_sdk_sns::Client) -> Self {
        Self { client }
    }

    /// Build a client from the default AWS credential chain for `region`.
    pub async fn from_region(region: impl Into<String>) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.into()))
            .load()
            .await;
        Self::new(aws_sdk_sns::Client::new(&config))
    }
}

/// SNS subjects must be a single line of at most 100 characters.
fn subject_line(message: &str) -> String {
    let first_line = message.lines().next().unwrap_or_default();
    first_line.chars().take(MAX_SUBJECT_CHARS).collect()
}

#[async_trait::async_trait]
impl Sink for SnsSink {
    fn key(&self) -> &str {
        "sns"
    }

    async fn send(&self, destination: &str, message: &str) -> Result<(), NotifyError> {
        tracing::debug!(topic = %destination, %message, "SNS");

        self.client
            .publish()
            .topic_arn(destination)
            .subject(subject_line(message))
            .message(message)
            .send()
            .await
            .map_err(|e| NotifyError::Sns(DisplayErrorContext(e).to_string()))?;

        Ok(())
    }
}
