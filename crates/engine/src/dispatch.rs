//! Per-kind event dispatch.
//!
//! One dispatcher runs per shared watch. It hands every add/update to each
//! interested rule in turn, waiting for each invocation (and its alerts) to
//! finish before moving on, so handlers of one kind see events strictly in
//! watch order. Dispatchers of different kinds run concurrently.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::DynamicObject;
use kube::Client;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::alert::Alert;
use crate::context::invoke;
use crate::multiplex::KindPlan;
use crate::source::WatchEvent;

/// Whether an add event describes an object that predates this process.
///
/// A zero `age_limit` disables the check. Objects without a creation
/// timestamp, or stamped in the future, are never stale.
pub fn is_stale(created: Option<DateTime<Utc>>, now: DateTime<Utc>, age_limit: Duration) -> bool {
    if age_limit.is_zero() {
        return false;
    }
    let Some(created) = created else {
        return false;
    };
    now.signed_duration_since(created)
        .to_std()
        .map(|age| age > age_limit)
        .unwrap_or(false)
}

/// Creation timestamp as a chrono value.
///
/// Goes through the RFC 3339 wire form so it does not depend on which
/// time library backs `meta::v1::Time`.
pub fn creation_time(meta: &ObjectMeta) -> Option<DateTime<Utc>> {
    let time = meta.creation_timestamp.as_ref()?;
    let value = serde_json::to_value(time).ok()?;
    value.as_str()?.parse().ok()
}

pub(crate) struct Dispatcher {
    plan: KindPlan,
    alerts: mpsc::Sender<Alert>,
    client: Option<Client>,
    age_limit: Duration,
}

impl Dispatcher {
    pub(crate) fn new(
        plan: KindPlan,
        alerts: mpsc::Sender<Alert>,
        client: Option<Client>,
        age_limit: Duration,
    ) -> Self {
        Self {
            plan,
            alerts,
            client,
            age_limit,
        }
    }

    fn kind(&self) -> &str {
        self.plan.target.name()
    }

    /// Consume the watch until it ends or `cancel` fires. `synced` is
    /// signalled on the first [`WatchEvent::Synced`].
    pub(crate) async fn run(
        self,
        mut events: BoxStream<'static, WatchEvent>,
        synced: oneshot::Sender<()>,
        cancel: CancellationToken,
    ) {
        let mut synced = Some(synced);

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.next() => match event {
                    Some(event) => event,
                    None => {
                        warn!(kind = %self.kind(), "watch stream ended");
                        break;
                    }
                },
            };

            match event {
                WatchEvent::Synced => {
                    if let Some(tx) = synced.take() {
                        info!(kind = %self.kind(), subscribers = self.plan.subscriptions.len(), "initial sync complete");
                        let _ = tx.send(());
                    }
                }
                event => self.dispatch(event).await,
            }
        }

        debug!(kind = %self.kind(), "dispatcher stopped");
    }

    pub(crate) async fn dispatch(&self, event: WatchEvent) {
        match event {
            WatchEvent::Added(obj) => {
                if is_stale(creation_time(&obj.metadata), Utc::now(), self.age_limit) {
                    debug!(
                        kind = %self.kind(),
                        namespace = obj.metadata.namespace.as_deref().unwrap_or_default(),
                        name = obj.metadata.name.as_deref().unwrap_or_default(),
                        "was too old when added"
                    );
                    return;
                }
                self.fan_out(None, &obj).await;
            }
            WatchEvent::Updated { old, new } => self.fan_out(Some(&old), &new).await,
            WatchEvent::Deleted(obj) => {
                debug!(
                    kind = %self.kind(),
                    name = obj.metadata.name.as_deref().unwrap_or_default(),
                    "deleted"
                );
            }
            WatchEvent::Synced => {}
        }
    }

    async fn fan_out(&self, old: Option<&DynamicObject>, new: &DynamicObject) {
        for sub in &self.plan.subscriptions {
            invoke(
                sub.binding.as_ref(),
                &sub.rule,
                old,
                new,
                &self.alerts,
                self.client.clone(),
            )
            .await;
        }
    }
}
