//! The boundary to the cluster's list/watch transport.

use futures::stream::BoxStream;
use kube::core::DynamicObject;

use crate::want::WatchTarget;

/// One change observed on a watch.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Added(DynamicObject),
    Updated {
        old: DynamicObject,
        new: DynamicObject,
    },
    Deleted(DynamicObject),
    /// The initial list has been fully delivered.
    Synced,
}

/// Opens watches. Each call is one underlying watch connection; the
/// engine calls it once per distinct kind.
///
/// `namespace` restricts the watch to one namespace; it is already
/// `None` for cluster-scoped kinds (see [`WatchTarget::scoped`]).
///
/// Streams are expected to recover from transport errors on their own
/// and only end when the source is shut down.
pub trait WatchSource: Send + Sync + 'static {
    fn watch(&self, target: &WatchTarget, namespace: Option<&str>) -> BoxStream<'static, WatchEvent>;
}
