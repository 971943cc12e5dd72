//! Reactive dispatch-and-routing engine.
//!
//! This crate provides:
//! - `Want` / `Rule` / `Registry` for declaring policy rules over cluster kinds
//! - A watch multiplexer that opens exactly one watch per wanted kind
//! - Per-kind event dispatch with a startup staleness filter
//! - Per-invocation `Context` for emitting alerts
//! - An immediate-predecessor dedup filter over (rule, object) identities
//! - An output router resolving sinks from namespace and object annotations

pub mod alert;
pub mod context;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod filter;
pub mod kube_source;
pub mod memory;
pub mod multiplex;
pub mod namespaces;
pub mod registry;
pub mod router;
pub mod rule;
pub mod source;
pub mod want;

pub use alert::{Alert, Identity, ObjectRef};
pub use context::Context;
pub use engine::{Engine, EngineConfig, RunningEngine};
pub use error::EngineError;
pub use filter::{spawn_filter, DedupFilter};
pub use kube_source::KubeSource;
pub use memory::MemorySource;
pub use multiplex::{unique_wants, WatchPlan};
pub use namespaces::NamespaceCache;
pub use registry::{Registry, RegistryBuilder};
pub use router::{Delivery, DeliveryOutcome, OutputRouter, ANNOTATION_PREFIX};
pub use rule::{Handler, Rule, RuleBuilder, RuleId, RuleMeta};
pub use source::{WatchEvent, WatchSource};
pub use want::{wants, Kind, Scope, Want, WatchTarget};

/// Format an alert message and emit it through a [`Context`].
///
/// ```ignore
/// alertf!(ctx, pod, "Pod `{}.{}` was killed", ns, name).await;
/// ```
#[macro_export]
macro_rules! alertf {
    ($ctx:expr, $object:expr, $($arg:tt)+) => {
        $ctx.alert($object, ::std::format!($($arg)+))
    };
}
