//! Output routing.
//!
//! Each alert is delivered to the sinks named by `com.uswitch.alert/<sink>`
//! annotations. Namespace annotations act as defaults; annotations on the
//! object itself override them key by key.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use klaxon_notify::Sink;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::alert::Alert;
use crate::namespaces::NamespaceCache;

pub use klaxon_core::ANNOTATION_PREFIX;

/// What happened to one (sink, destination) pair of a routed alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    NoSink,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub sink: String,
    pub destination: String,
    pub outcome: DeliveryOutcome,
}

/// Copy every `<prefix>/<sink>` entry of `annotations` into `out`, keyed by
/// the sink name. Existing entries in `out` are overwritten.
fn extract_outputs(annotations: &BTreeMap<String, String>, out: &mut BTreeMap<String, String>) {
    for (key, value) in annotations {
        let Some(sink) = key
            .strip_prefix(ANNOTATION_PREFIX)
            .and_then(|rest| rest.strip_prefix('/'))
        else {
            continue;
        };
        if sink.is_empty() {
            continue;
        }
        out.insert(sink.to_string(), value.clone());
    }
}

pub struct OutputRouter {
    sinks: HashMap<String, Arc<dyn Sink>>,
    namespaces: Option<NamespaceCache>,
}

impl OutputRouter {
    /// `namespaces` is `None` when the namespace cache never synced; routing
    /// then only sees object annotations.
    pub fn new(sinks: HashMap<String, Arc<dyn Sink>>, namespaces: Option<NamespaceCache>) -> Self {
        Self { sinks, namespaces }
    }

    /// Sink key to destination for `alert`.
    pub fn resolve(&self, alert: &Alert) -> BTreeMap<String, String> {
        let mut outputs = BTreeMap::new();

        if let (Some(cache), Some(ns)) = (&self.namespaces, alert.object.namespace.as_deref()) {
            extract_outputs(&cache.annotations(ns), &mut outputs);
        }
        extract_outputs(&alert.object.annotations, &mut outputs);

        outputs
    }

    /// Deliver `alert` to every resolved sink. Failures are logged and
    /// reported per destination, never returned.
    pub async fn route(&self, alert: &Alert) -> Vec<Delivery> {
        let outputs = self.resolve(alert);
        if outputs.is_empty() {
            debug!(
                rule = %alert.rule.name,
                object = %alert.object,
                "no output annotations, dropping alert"
            );
            return Vec::new();
        }

        let mut deliveries = Vec::with_capacity(outputs.len());
        for (key, destination) in outputs {
            let outcome = match self.sinks.get(&key) {
                None => {
                    warn!(sink = %key, object = %alert.object, "no sink registered for output annotation");
                    DeliveryOutcome::NoSink
                }
                Some(sink) => match sink.send(&destination, &alert.message).await {
                    Ok(()) => {
                        info!(sink = %key, destination = %destination, rule = %alert.rule.name, "alert delivered");
                        DeliveryOutcome::Delivered
                    }
                    Err(e) => {
                        error!(sink = %key, destination = %destination, error = %e, "alert delivery failed");
                        DeliveryOutcome::Failed(e.to_string())
                    }
                },
            };
            deliveries.push(Delivery {
                sink: key,
                destination,
                outcome,
            });
        }
        deliveries
    }

    /// Route alerts from `alerts` until it closes or `cancel` fires. A
    /// delivery already in progress runs to completion.
    pub async fn run(self, mut alerts: mpsc::Receiver<Alert>, cancel: CancellationToken) {
        loop {
            let alert = tokio::select! {
                _ = cancel.cancelled() => break,
                alert = alerts.recv() => match alert {
                    Some(alert) => alert,
                    None => break,
                },
            };
            let deliveries = self.route(&alert).await;
            let delivered = deliveries
                .iter()
                .filter(|d| d.outcome == DeliveryOutcome::Delivered)
                .count();
            debug!(
                rule = %alert.rule.name,
                object = %alert.object,
                delivered,
                attempted = deliveries.len(),
                "alert routed"
            );
        }
        debug!("output router stopped");
    }
}
