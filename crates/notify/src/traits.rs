//! Sink trait definition and shared error types.

/// Errors that can occur during alert delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} API error: {message}")]
    Api { service: &'static str, message: String },

    #[error("SNS publish failed: {0}")]
    Sns(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// A named delivery channel.
///
/// The engine looks sinks up by [`key`](Sink::key), which is matched
/// against the suffix of routing annotations
/// (`com.uswitch.alert/<key>: <destination>`). The destination string is
/// passed through verbatim; what it means (a channel, a topic ARN, a URL)
/// is up to the sink.
#[async_trait::async_trait]
pub trait Sink: Send + Sync {
    /// Routing key for this sink (e.g., "slack", "sns").
    fn key(&self) -> &str;

    /// Deliver `message` to `destination`.
    async fn send(&self, destination: &str, message: &str) -> Result<(), NotifyError>;
}
