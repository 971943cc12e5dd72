//! Slack Web API sink.
//!
//! Posts alerts with `chat.postMessage`. The routing annotation value is
//! the channel (name or ID) to post into.

use serde::Deserialize;

use crate::traits::{NotifyError, Sink};

const SLACK_API_BASE: &str = "https://slack.com/api";

/// Delivers alerts to Slack channels using a bot token.
#[derive(Debug)]
pub struct SlackSink {
    token: String,
    api_base: String,
    client: reqwest::Client,
}

/// The subset of Slack's response envelope we care about.
#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

impl SlackSink {
    /// Creates a sink authenticating with `token`.
    ///
    /// Returns [`NotifyError::Config`] if the token is empty.
    pub fn new(token: impl Into<String>) -> Result<Self, NotifyError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(NotifyError::Config(
                "Slack token must not be empty".to_string(),
            ));
        }

        Ok(Self {
            token,
            api_base: SLACK_API_BASE.to_string(),
            client: reqwest::Client::new(),
        })
    }

    /// Point the sink at a different API base URL.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait::async_trait]
impl Sink for SlackSink {
    fn key(&self) -> &str {
        "slack"
    }

    async fn send(&self, destination: &str, message: &str) -> Result<(), NotifyError> {
        tracing::debug!(channel = %destination, %message, "SLACK");

        let url = format!("{}/chat.postMessage", self.api_base);
        let body = serde_json::json!({
            "channel": destination,
            "text": message,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let reply: SlackResponse = response.json().await?;
        if reply.ok {
            return Ok(());
        }

        Err(NotifyError::Api {
            service: "slack",
            message: reply.error.unwrap_or_else(|| "unknown error".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::serve_once;

    #[test]
    fn empty_token_rejected() {
        let err = SlackSink::new("  ").unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn key_is_slack() {
        let sink = SlackSink::new("xoxb-token").unwrap();
        assert_eq!(sink.key(), "slack");
    }

    #[tokio::test]
    async fn posts_channel_and_text_with_bearer_token() {
        let (base, request) = serve_once(200, r#"{"ok":true}"#).await;
        let sink = SlackSink::new("xoxb-token").unwrap().with_api_base(base);

        sink.send("#ops", "pod died").await.unwrap();

        let request = request.await.unwrap();
        assert!(request.starts_with("POST /chat.postMessage"));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer xoxb-token"));
        assert!(request.contains(r##""channel":"#ops""##));
        assert!(request.contains(r#""text":"pod died""#));
    }

    #[tokio::test]
    async fn not_ok_reply_is_an_error() {
        let (base, _request) = serve_once(200, r#"{"ok":false,"error":"channel_not_found"}"#).await;
        let sink = SlackSink::new("xoxb-token").unwrap().with_api_base(base);

        match sink.send("#nowhere", "hello").await {
            Err(NotifyError::Api { service, message }) => {
                assert_eq!(service, "slack");
                assert_eq!(message, "channel_not_found");
            }
            other => panic!("expected Api error, got: {other:?}"),
        }
    }
}
