//! Read-through cache of namespace objects, kept current by a background
//! watch. Readers only ever see a snapshot; a missing namespace reads as
//! "no annotations".

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use futures::stream::{BoxStream, StreamExt};
use k8s_openapi::api::core::v1::Namespace;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::source::WatchEvent;
use crate::want::{wants, Want};

#[derive(Debug, Clone, Default)]
pub struct NamespaceCache {
    inner: Arc<RwLock<HashMap<String, Namespace>>>,
}

impl NamespaceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Annotations of `name`, empty when the namespace is unknown.
    pub fn annotations(&self, name: &str) -> BTreeMap<String, String> {
        self.inner
            .read()
            .expect("namespace cache lock poisoned")
            .get(name)
            .and_then(|ns| ns.metadata.annotations.clone())
            .unwrap_or_default()
    }

    pub fn insert(&self, namespace: Namespace) {
        let Some(name) = namespace.metadata.name.clone() else {
            return;
        };
        self.inner
            .write()
            .expect("namespace cache lock poisoned")
            .insert(name, namespace);
    }

    pub fn remove(&self, name: &str) {
        self.inner
            .write()
            .expect("namespace cache lock poisoned")
            .remove(name);
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("namespace cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn apply(&self, want: &Want<Namespace>, event: WatchEvent) {
        match event {
            WatchEvent::Added(obj) | WatchEvent::Updated { new: obj, .. } => match want.decode(&obj) {
                Ok(ns) => self.insert(ns),
                Err(e) => warn!(error = %e, "failed to decode namespace"),
            },
            WatchEvent::Deleted(obj) => {
                if let Some(name) = obj.metadata.name.as_deref() {
                    self.remove(name);
                }
            }
            WatchEvent::Synced => {}
        }
    }

    /// Keep the cache in sync with `events` until cancelled. `synced` fires
    /// once the initial list has been applied.
    pub(crate) async fn sync(
        self,
        mut events: BoxStream<'static, WatchEvent>,
        synced: oneshot::Sender<()>,
        cancel: CancellationToken,
    ) {
        let want = wants::namespaces();
        let mut synced = Some(synced);

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.next() => match event {
                    Some(event) => event,
                    None => {
                        warn!("namespace watch ended");
                        break;
                    }
                },
            };

            if matches!(event, WatchEvent::Synced) {
                if let Some(tx) = synced.take() {
                    info!(namespaces = self.len(), "namespace cache synced");
                    let _ = tx.send(());
                }
                continue;
            }
            self.apply(&want, event);
        }

        debug!("namespace cache sync stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::DynamicObject;

    fn namespace(name: &str, annotations: serde_json::Value) -> DynamicObject {
        serde_json::from_value(serde_json::json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": { "name": name, "annotations": annotations }
        }))
        .unwrap()
    }

    #[test]
    fn unknown_namespace_has_no_annotations() {
        let cache = NamespaceCache::new();
        assert!(cache.annotations("nope").is_empty());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn sync_applies_events_and_signals() {
        let cache = NamespaceCache::new();
        let events = futures::stream::iter(vec![
            WatchEvent::Added(namespace("shop", serde_json::json!({ "a": "1" }))),
            WatchEvent::Added(namespace("gone", serde_json::json!({}))),
            WatchEvent::Synced,
            WatchEvent::Updated {
                old: namespace("shop", serde_json::json!({ "a": "1" })),
                new: namespace("shop", serde_json::json!({ "a": "2" })),
            },
            WatchEvent::Deleted(namespace("gone", serde_json::json!({}))),
        ])
        .boxed();

        let (tx, rx) = oneshot::channel();
        cache.clone().sync(events, tx, CancellationToken::new()).await;

        assert!(rx.await.is_ok());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.annotations("shop")["a"], "2");
    }
}
