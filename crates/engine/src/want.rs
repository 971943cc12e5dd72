//! Declarations of the resource kinds a rule observes.

use std::fmt;
use std::fmt::Debug;
use std::marker::PhantomData;

use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::core::{ApiResource, DynamicObject};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;

/// A typed cluster object a rule can watch.
pub trait Kind:
    Resource<DynamicType = ()> + DeserializeOwned + Clone + Debug + Send + Sync + 'static
{
}

impl<K> Kind for K where
    K: Resource<DynamicType = ()> + DeserializeOwned + Clone + Debug + Send + Sync + 'static
{
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Namespaced,
    Cluster,
}

/// The untyped part of a [`Want`]: what to open a watch on.
#[derive(Debug, Clone)]
pub struct WatchTarget {
    name: String,
    resource: ApiResource,
    scope: Scope,
}

impl WatchTarget {
    /// Kind name used to deduplicate watches (e.g. "pods").
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resource(&self) -> &ApiResource {
        &self.resource
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// The namespace a watch on this kind is restricted to under the
    /// configured `namespace`. Cluster-scoped kinds are never restricted.
    pub fn scoped<'a>(&self, namespace: Option<&'a str>) -> Option<&'a str> {
        match self.scope {
            Scope::Namespaced => namespace.filter(|ns| !ns.is_empty()),
            Scope::Cluster => None,
        }
    }

    /// Select the API handle for this kind within `namespace`.
    pub fn api(&self, client: Client, namespace: Option<&str>) -> Api<DynamicObject> {
        match self.scoped(namespace) {
            Some(ns) => Api::namespaced_with(client, ns, &self.resource),
            None => Api::all_with(client, &self.resource),
        }
    }

    pub(crate) fn same_resource(&self, other: &WatchTarget) -> bool {
        self.resource.group == other.resource.group
            && self.resource.version == other.resource.version
            && self.resource.kind == other.resource.kind
    }
}

impl fmt::Display for WatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}/{})", self.name, self.resource.api_version, self.resource.kind)
    }
}

/// A rule's declaration that it needs to observe kind `K`.
///
/// The type parameter is the decoding prototype: events for this want are
/// decoded into `K` before any handler sees them.
pub struct Want<K> {
    target: WatchTarget,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Clone for Want<K> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K> Debug for Want<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Want").field("target", &self.target).finish()
    }
}

impl<K: Kind> Want<K> {
    fn with_scope(name: impl Into<String>, scope: Scope) -> Self {
        Self {
            target: WatchTarget {
                name: name.into(),
                resource: ApiResource::erase::<K>(&()),
                scope,
            },
            _kind: PhantomData,
        }
    }

    pub fn target(&self) -> &WatchTarget {
        &self.target
    }

    pub fn name(&self) -> &str {
        self.target.name()
    }

    /// Decode a watched object into `K`.
    pub(crate) fn decode(&self, object: &DynamicObject) -> Result<K, serde_json::Error> {
        serde_json::to_value(object).and_then(serde_json::from_value)
    }
}

impl<K: Kind + Resource<Scope = NamespaceResourceScope>> Want<K> {
    pub fn namespaced(name: impl Into<String>) -> Self {
        Self::with_scope(name, Scope::Namespaced)
    }
}

impl<K: Kind + Resource<Scope = ClusterResourceScope>> Want<K> {
    pub fn cluster(name: impl Into<String>) -> Self {
        Self::with_scope(name, Scope::Cluster)
    }
}

/// Wants for the kinds the built-in rules use.
pub mod wants {
    use k8s_openapi::api::apps::v1::Deployment;
    use k8s_openapi::api::batch::v1::CronJob;
    use k8s_openapi::api::core::v1::{Namespace, Pod};
    use k8s_openapi::api::networking::v1::Ingress;

    use super::Want;

    pub fn pods() -> Want<Pod> {
        Want::namespaced("pods")
    }

    pub fn deployments() -> Want<Deployment> {
        Want::namespaced("deployments")
    }

    pub fn cronjobs() -> Want<CronJob> {
        Want::namespaced("cronjobs")
    }

    pub fn ingresses() -> Want<Ingress> {
        Want::namespaced("ingresses")
    }

    pub fn namespaces() -> Want<Namespace> {
        Want::cluster("namespaces")
    }
}
