//! Per-invocation handle handed to rule handlers.

use std::sync::Arc;

use kube::core::DynamicObject;
use kube::{Client, Resource};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::alert::{Alert, ObjectRef};
use crate::rule::{Binding, RuleMeta};

/// Lets one handler call raise alerts tagged with its rule.
///
/// Each call gets a fresh context whose private channel is drained into
/// the shared alert stream; the channel closes when the handler returns.
pub struct Context {
    rule: Arc<RuleMeta>,
    alerts: mpsc::Sender<Alert>,
    client: Option<Client>,
}

impl Context {
    pub fn new(rule: Arc<RuleMeta>, alerts: mpsc::Sender<Alert>, client: Option<Client>) -> Self {
        Self {
            rule,
            alerts,
            client,
        }
    }

    pub fn rule(&self) -> &RuleMeta {
        &self.rule
    }

    /// Cluster client for supplementary lookups (logs, related objects).
    /// `None` when the engine runs without a live cluster.
    pub fn client(&self) -> Option<&Client> {
        self.client.as_ref()
    }

    /// Raise an alert about `object`. Waits until the alert is taken by
    /// the forwarder.
    pub async fn alert<R>(&self, object: &R, message: impl Into<String>)
    where
        R: Resource<DynamicType = ()>,
    {
        let alert = Alert::new(self.rule.clone(), ObjectRef::from_resource(object), message);
        debug!(rule = %self.rule.name, object = %alert.object, message = %alert.message, "alert raised");

        if self.alerts.send(alert).await.is_err() {
            warn!(rule = %self.rule.name, "alert stream closed, dropping alert");
        }
    }
}

/// Run one handler for one event and forward everything it raises.
///
/// The handler and the forwarder run as a joined pair: the event counts
/// as processed only once the handler has returned and every alert it
/// raised has been handed to the shared stream, in order.
pub(crate) async fn invoke(
    binding: &dyn Binding,
    rule: &Arc<RuleMeta>,
    old: Option<&DynamicObject>,
    new: &DynamicObject,
    shared: &mpsc::Sender<Alert>,
    client: Option<Client>,
) {
    let (tx, mut rx) = mpsc::channel::<Alert>(1);
    let ctx = Context::new(rule.clone(), tx, client);

    let handler = async move {
        binding.invoke(old, new, &ctx).await;
        drop(ctx);
    };

    let forwarder = async move {
        while let Some(alert) = rx.recv().await {
            if shared.send(alert).await.is_err() {
                debug!("shared alert stream closed, forwarder exiting");
                break;
            }
        }
    };

    tokio::join!(handler, forwarder);
}
