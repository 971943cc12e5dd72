//! [`WatchSource`] backed by the Kubernetes API.
//!
//! Uses `kube::runtime::watcher` with default backoff and keeps a per-watch
//! store of the last seen version of every object, so that updates carry
//! the previous object and relists are turned into adds, updates and
//! deletes rather than a replay of the whole world.

use std::collections::{HashMap, HashSet};

use futures::stream::{self, BoxStream, StreamExt};
use kube::core::DynamicObject;
use kube::runtime::watcher;
use kube::runtime::WatchStreamExt;
use kube::Client;
use tracing::{debug, warn};

use crate::source::{WatchEvent, WatchSource};
use crate::want::WatchTarget;

#[derive(Clone)]
pub struct KubeSource {
    client: Client,
}

impl KubeSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl WatchSource for KubeSource {
    fn watch(&self, target: &WatchTarget, namespace: Option<&str>) -> BoxStream<'static, WatchEvent> {
        let api = target.api(self.client.clone(), namespace);
        let kind = target.name().to_string();
        let mut tracker = Tracker::default();

        debug!(kind = %kind, namespace = ?namespace, "opening watch");

        watcher(api, watcher::Config::default())
            .default_backoff()
            .flat_map(move |result| {
                let events = match result {
                    Ok(event) => tracker.apply(event),
                    Err(e) => {
                        warn!(kind = %kind, error = %e, "watch error, retrying");
                        Vec::new()
                    }
                };
                stream::iter(events)
            })
            .boxed()
    }
}

/// Turns raw watcher events into add/update/delete with previous versions.
#[derive(Default)]
struct Tracker {
    known: HashMap<String, DynamicObject>,
    /// Keys seen during the relist in progress, if any.
    relisted: Option<HashSet<String>>,
    synced: bool,
}

impl Tracker {
    fn apply(&mut self, event: watcher::Event<DynamicObject>) -> Vec<WatchEvent> {
        match event {
            watcher::Event::Apply(obj) => vec![self.upsert(obj)],
            watcher::Event::Delete(obj) => {
                self.known.remove(&object_key(&obj));
                vec![WatchEvent::Deleted(obj)]
            }
            watcher::Event::Init => {
                self.relisted = Some(HashSet::new());
                Vec::new()
            }
            watcher::Event::InitApply(obj) => {
                if let Some(seen) = self.relisted.as_mut() {
                    seen.insert(object_key(&obj));
                }
                vec![self.upsert(obj)]
            }
            watcher::Event::InitDone => {
                let seen = self.relisted.take().unwrap_or_default();
                let vanished: Vec<String> = self
                    .known
                    .keys()
                    .filter(|key| !seen.contains(*key))
                    .cloned()
                    .collect();

                let mut events: Vec<WatchEvent> = vanished
                    .into_iter()
                    .filter_map(|key| self.known.remove(&key))
                    .map(WatchEvent::Deleted)
                    .collect();

                if !self.synced {
                    self.synced = true;
                    events.push(WatchEvent::Synced);
                }
                events
            }
        }
    }

    fn upsert(&mut self, obj: DynamicObject) -> WatchEvent {
        match self.known.insert(object_key(&obj), obj.clone()) {
            Some(old) => WatchEvent::Updated { old, new: obj },
            None => WatchEvent::Added(obj),
        }
    }
}

fn object_key(obj: &DynamicObject) -> String {
    match &obj.metadata.uid {
        Some(uid) => uid.clone(),
        None => format!(
            "{}/{}",
            obj.metadata.namespace.as_deref().unwrap_or_default(),
            obj.metadata.name.as_deref().unwrap_or_default()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod(uid: &str, version: &str) -> DynamicObject {
        serde_json::from_value(serde_json::json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": { "name": uid, "namespace": "default", "uid": uid, "resourceVersion": version }
        }))
        .unwrap()
    }

    fn names(events: &[WatchEvent]) -> Vec<String> {
        events
            .iter()
            .map(|e| match e {
                WatchEvent::Added(o) => format!("add:{}", o.metadata.uid.as_deref().unwrap()),
                WatchEvent::Updated { old, new } => format!(
                    "update:{}:{}->{}",
                    new.metadata.uid.as_deref().unwrap(),
                    old.metadata.resource_version.as_deref().unwrap(),
                    new.metadata.resource_version.as_deref().unwrap()
                ),
                WatchEvent::Deleted(o) => format!("delete:{}", o.metadata.uid.as_deref().unwrap()),
                WatchEvent::Synced => "synced".to_string(),
            })
            .collect()
    }

    #[test]
    fn initial_list_is_added_then_synced() {
        let mut tracker = Tracker::default();
        let mut events = tracker.apply(watcher::Event::Init);
        events.extend(tracker.apply(watcher::Event::InitApply(pod("a", "1"))));
        events.extend(tracker.apply(watcher::Event::InitApply(pod("b", "1"))));
        events.extend(tracker.apply(watcher::Event::InitDone));
        assert_eq!(names(&events), vec!["add:a", "add:b", "synced"]);
    }

    #[test]
    fn apply_on_known_object_carries_previous_version() {
        let mut tracker = Tracker::default();
        tracker.apply(watcher::Event::Apply(pod("a", "1")));
        let events = tracker.apply(watcher::Event::Apply(pod("a", "2")));
        assert_eq!(names(&events), vec!["update:a:1->2"]);
    }

    #[test]
    fn relist_reports_vanished_objects_and_syncs_once() {
        let mut tracker = Tracker::default();
        tracker.apply(watcher::Event::Init);
        tracker.apply(watcher::Event::InitApply(pod("a", "1")));
        tracker.apply(watcher::Event::InitApply(pod("b", "1")));
        tracker.apply(watcher::Event::InitDone);

        let mut events = tracker.apply(watcher::Event::Init);
        events.extend(tracker.apply(watcher::Event::InitApply(pod("a", "2"))));
        events.extend(tracker.apply(watcher::Event::InitApply(pod("c", "1"))));
        events.extend(tracker.apply(watcher::Event::InitDone));
        assert_eq!(names(&events), vec!["update:a:1->2", "add:c", "delete:b"]);
    }

    #[test]
    fn delete_forgets_the_object() {
        let mut tracker = Tracker::default();
        tracker.apply(watcher::Event::Apply(pod("a", "1")));
        tracker.apply(watcher::Event::Delete(pod("a", "2")));
        let events = tracker.apply(watcher::Event::Apply(pod("a", "3")));
        assert_eq!(names(&events), vec!["add:a"]);
    }
}
