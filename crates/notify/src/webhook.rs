//! Generic HTTP webhook sink.
//!
//! The routing destination is the URL; the alert is delivered as a JSON
//! payload `{"text": "<message>"}`, which Slack-compatible incoming
//! webhooks (Mattermost, Rocket.Chat, Slack itself) accept as-is.

use std::collections::HashMap;

use crate::traits::{NotifyError, Sink};

/// Delivers alerts as JSON over HTTP POST.
#[derive(Debug, Default)]
pub struct WebhookSink {
    /// Custom headers to include on every request.
    headers: HashMap<String, String>,
    /// Shared HTTP client (connection pooling).
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header sent with every request (e.g., an auth token).
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

#[async_trait::async_trait]
impl Sink for WebhookSink {
    fn key(&self) -> &str {
        "webhook"
    }

    async fn send(&self, destination: &str, message: &str) -> Result<(), NotifyError> {
        if !destination.starts_with("http://") && !destination.starts_with("https://") {
            return Err(NotifyError::Config(format!(
                "webhook destination is not an http(s) URL: {destination}"
            )));
        }

        let mut request = self
            .client
            .post(destination)
            .json(&serde_json::json!({ "text": message }));

        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(NotifyError::Api {
                service: "webhook",
                message: format!("{status}: {body_text}"),
            });
        }

        tracing::debug!(url = %destination, %status, "webhook alert delivered");
        Ok(())
    }
}
