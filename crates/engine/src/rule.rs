//! Rules: an identity, the kinds it wants, and a typed handler per kind.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use kube::core::DynamicObject;
use tracing::error;
use uuid::Uuid;

use crate::context::Context;
use crate::want::{Kind, Want, WatchTarget};

/// Unique rule identity, generated once when the rule is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(Uuid);

impl RuleId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The part of a rule every alert it raises carries along.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMeta {
    pub id: RuleId,
    pub name: String,
}

/// Policy logic for one kind.
///
/// Called with `old = None` for add events and `Some(previous)` for
/// updates. Findings are reported only through [`Context::alert`].
#[async_trait]
pub trait Handler<K: Kind>: Send + Sync + 'static {
    async fn handle(&self, old: Option<&K>, new: &K, ctx: &Context);
}

/// A want paired with its handler, with the kind erased so bindings for
/// different kinds can share one list.
pub(crate) trait Binding: Send + Sync {
    fn target(&self) -> &WatchTarget;

    fn invoke<'a>(
        &'a self,
        old: Option<&'a DynamicObject>,
        new: &'a DynamicObject,
        ctx: &'a Context,
    ) -> BoxFuture<'a, ()>;
}

struct TypedBinding<K: Kind> {
    want: Want<K>,
    handler: Box<dyn Handler<K>>,
}

impl<K: Kind> Binding for TypedBinding<K> {
    fn target(&self) -> &WatchTarget {
        self.want.target()
    }

    fn invoke<'a>(
        &'a self,
        old: Option<&'a DynamicObject>,
        new: &'a DynamicObject,
        ctx: &'a Context,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let new = match self.want.decode(new) {
                Ok(obj) => obj,
                Err(e) => {
                    error!(kind = %self.want.name(), rule = %ctx.rule().name, error = %e, "failed to decode object");
                    return;
                }
            };
            let old = match old.map(|o| self.want.decode(o)).transpose() {
                Ok(obj) => obj,
                Err(e) => {
                    error!(kind = %self.want.name(), rule = %ctx.rule().name, error = %e, "failed to decode previous object");
                    return;
                }
            };

            self.handler.handle(old.as_ref(), &new, ctx).await;
        })
    }
}

/// A registered policy rule. Never mutated after [`RuleBuilder::build`].
pub struct Rule {
    meta: Arc<RuleMeta>,
    bindings: Vec<Arc<dyn Binding>>,
}

impl Rule {
    pub fn builder(name: impl Into<String>) -> RuleBuilder {
        RuleBuilder {
            name: name.into(),
            bindings: Vec::new(),
        }
    }

    pub fn id(&self) -> RuleId {
        self.meta.id
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn meta(&self) -> &Arc<RuleMeta> {
        &self.meta
    }

    /// Kinds this rule wants, in declaration order.
    pub fn wants(&self) -> impl Iterator<Item = &WatchTarget> {
        self.bindings.iter().map(|b| b.target())
    }

    pub(crate) fn bindings(&self) -> &[Arc<dyn Binding>] {
        &self.bindings
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.meta.id)
            .field("name", &self.meta.name)
            .field("wants", &self.wants().map(WatchTarget::name).collect::<Vec<_>>())
            .finish()
    }
}

pub struct RuleBuilder {
    name: String,
    bindings: Vec<Arc<dyn Binding>>,
}

impl RuleBuilder {
    /// Observe `want`'s kind with `handler`.
    pub fn watch<K, H>(mut self, want: Want<K>, handler: H) -> Self
    where
        K: Kind,
        H: Handler<K>,
    {
        self.bindings.push(Arc::new(TypedBinding {
            want,
            handler: Box::new(handler),
        }));
        self
    }

    pub fn build(self) -> Rule {
        Rule {
            meta: Arc::new(RuleMeta {
                id: RuleId::generate(),
                name: self.name,
            }),
            bindings: self.bindings,
        }
    }
}
