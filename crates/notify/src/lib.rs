//! Alert delivery sinks.
//!
//! This crate provides:
//! - `Sink` trait for pluggable delivery channels, keyed by the suffix of
//!   the routing annotation that selects them
//! - Slack, SNS, and webhook sink implementations

pub mod slack;
pub mod sns;
pub mod traits;
pub mod webhook;

#[cfg(test)]
pub(crate) mod test_server;

pub use slack::SlackSink;
pub use sns::SnsSink;
pub use traits::{NotifyError, Sink};
pub use webhook::WebhookSink;
