//! An in-process [`WatchSource`] fed by hand.
//!
//! Useful for replaying recorded events and for exercising rules without a
//! cluster. Events pushed before a watch is opened are queued and replayed
//! to the first watch opened for that kind. A watch opened with a
//! namespace only sees objects in that namespace.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::future;
use futures::stream::{BoxStream, StreamExt};

use crate::source::{WatchEvent, WatchSource};
use crate::want::WatchTarget;

#[derive(Default)]
struct Feeds {
    backlog: HashMap<String, Vec<WatchEvent>>,
    live: HashMap<String, Vec<UnboundedSender<WatchEvent>>>,
    /// Namespace requested by every watch opened, per kind.
    opened: HashMap<String, Vec<Option<String>>>,
}

#[derive(Clone, Default)]
pub struct MemorySource {
    feeds: Arc<Mutex<Feeds>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every open watch on `kind`, or queue it until
    /// one is opened.
    pub fn push(&self, kind: &str, event: WatchEvent) {
        let mut feeds = self.feeds.lock().expect("memory source lock poisoned");
        let senders = feeds.live.entry(kind.to_string()).or_default();
        senders.retain(|tx| !tx.is_closed());

        if senders.is_empty() {
            feeds.backlog.entry(kind.to_string()).or_default().push(event);
            return;
        }
        for tx in senders.iter() {
            let _ = tx.unbounded_send(event.clone());
        }
    }

    /// Close every open watch on `kind`.
    pub fn close(&self, kind: &str) {
        let mut feeds = self.feeds.lock().expect("memory source lock poisoned");
        feeds.live.remove(kind);
    }

    /// How many watches have been opened for `kind`.
    pub fn opened(&self, kind: &str) -> usize {
        self.scopes(kind).len()
    }

    /// Namespace each watch on `kind` was opened with, in opening order.
    pub fn scopes(&self, kind: &str) -> Vec<Option<String>> {
        let feeds = self.feeds.lock().expect("memory source lock poisoned");
        feeds.opened.get(kind).cloned().unwrap_or_default()
    }

    /// Total watches opened across all kinds.
    pub fn total_opened(&self) -> usize {
        let feeds = self.feeds.lock().expect("memory source lock poisoned");
        feeds.opened.values().map(Vec::len).sum()
    }
}

impl WatchSource for MemorySource {
    fn watch(&self, target: &WatchTarget, namespace: Option<&str>) -> BoxStream<'static, WatchEvent> {
        let kind = target.name().to_string();
        let namespace = namespace.map(str::to_string);
        let (tx, rx) = unbounded();

        let mut feeds = self.feeds.lock().expect("memory source lock poisoned");
        feeds.opened.entry(kind.clone()).or_default().push(namespace.clone());
        for event in feeds.backlog.remove(&kind).unwrap_or_default() {
            let _ = tx.unbounded_send(event);
        }
        feeds.live.entry(kind).or_default().push(tx);

        rx.filter(move |event| future::ready(in_scope(event, namespace.as_deref())))
            .boxed()
    }
}

fn in_scope(event: &WatchEvent, namespace: Option<&str>) -> bool {
    let Some(namespace) = namespace else {
        return true;
    };
    let object = match event {
        WatchEvent::Added(obj) | WatchEvent::Deleted(obj) => obj,
        WatchEvent::Updated { new, .. } => new,
        WatchEvent::Synced => return true,
    };
    object.metadata.namespace.as_deref() == Some(namespace)
}
