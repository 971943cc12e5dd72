//! Collapses every rule's wants into one watch per kind.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::EngineError;
use crate::rule::{Binding, Rule, RuleMeta};
use crate::want::WatchTarget;

/// A rule's handler for one kind.
pub(crate) struct Subscription {
    pub(crate) rule: Arc<RuleMeta>,
    pub(crate) binding: Arc<dyn Binding>,
}

/// One shared watch and everyone listening on it.
pub(crate) struct KindPlan {
    pub(crate) target: WatchTarget,
    pub(crate) subscriptions: Vec<Subscription>,
}

/// The set of watches to open, in first-registration order.
pub struct WatchPlan {
    kinds: Vec<KindPlan>,
}

impl WatchPlan {
    /// Group bindings by kind name. The first want registered for a name
    /// decides the target; later wants must agree on the API resource.
    pub fn build(rules: &[Rule]) -> Result<Self, EngineError> {
        let mut kinds: Vec<KindPlan> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for rule in rules {
            for binding in rule.bindings() {
                let target = binding.target();
                let subscription = Subscription {
                    rule: rule.meta().clone(),
                    binding: binding.clone(),
                };

                match index.get(target.name()) {
                    Some(&i) => {
                        let existing = &kinds[i].target;
                        if !existing.same_resource(target) {
                            return Err(EngineError::ConflictingWant {
                                name: target.name().to_string(),
                                first: existing.to_string(),
                                second: target.to_string(),
                            });
                        }
                        kinds[i].subscriptions.push(subscription);
                    }
                    None => {
                        index.insert(target.name().to_string(), kinds.len());
                        kinds.push(KindPlan {
                            target: target.clone(),
                            subscriptions: vec![subscription],
                        });
                    }
                }
            }
        }

        Ok(Self { kinds })
    }

    pub fn targets(&self) -> impl Iterator<Item = &WatchTarget> {
        self.kinds.iter().map(|k| &k.target)
    }

    /// Number of handlers bound to `kind`.
    pub fn subscribers(&self, kind: &str) -> usize {
        self.kinds
            .iter()
            .find(|k| k.target.name() == kind)
            .map(|k| k.subscriptions.len())
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub(crate) fn into_kinds(self) -> Vec<KindPlan> {
        self.kinds
    }
}

/// The distinct kinds wanted across `rules`, first registration wins.
pub fn unique_wants(rules: &[Rule]) -> Result<Vec<WatchTarget>, EngineError> {
    Ok(WatchPlan::build(rules)?.targets().cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::rule::Handler;
    use crate::want::{wants, Want};
    use async_trait::async_trait;
    use k8s_openapi::api::apps::v1::Deployment;
    use k8s_openapi::api::core::v1::Pod;

    struct Noop;

    #[async_trait]
    impl Handler<Pod> for Noop {
        async fn handle(&self, _old: Option<&Pod>, _new: &Pod, _ctx: &Context) {}
    }

    #[async_trait]
    impl Handler<Deployment> for Noop {
        async fn handle(&self, _old: Option<&Deployment>, _new: &Deployment, _ctx: &Context) {}
    }

    #[test]
    fn shared_kinds_collapse_to_one_target() {
        let rules = vec![
            Rule::builder("a").watch(wants::pods(), Noop).build(),
            Rule::builder("b").watch(wants::deployments(), Noop).build(),
            Rule::builder("c")
                .watch(wants::pods(), Noop)
                .watch(wants::deployments(), Noop)
                .build(),
        ];

        let plan = WatchPlan::build(&rules).unwrap();
        let names: Vec<_> = plan.targets().map(WatchTarget::name).collect();
        assert_eq!(names, vec!["pods", "deployments"]);
        assert_eq!(plan.subscribers("pods"), 2);
        assert_eq!(plan.subscribers("deployments"), 2);
        assert_eq!(plan.subscribers("ingresses"), 0);
    }

    #[test]
    fn subscriptions_keep_registration_order() {
        let rules = vec![
            Rule::builder("first").watch(wants::pods(), Noop).build(),
            Rule::builder("second").watch(wants::pods(), Noop).build(),
        ];
        let plan = WatchPlan::build(&rules).unwrap();
        let kinds = plan.into_kinds();
        let order: Vec<_> = kinds[0].subscriptions.iter().map(|s| s.rule.name.as_str()).collect();
        assert_eq!(order, vec!["first", "second"]);
    }

    #[test]
    fn same_name_different_resource_is_rejected() {
        let rules = vec![
            Rule::builder("a").watch(wants::pods(), Noop).build(),
            Rule::builder("b")
                .watch(Want::<Deployment>::namespaced("pods"), Noop)
                .build(),
        ];
        match WatchPlan::build(&rules) {
            Err(EngineError::ConflictingWant { name, .. }) => assert_eq!(name, "pods"),
            other => panic!("expected ConflictingWant, got {:?}", other.map(|p| p.len())),
        }
    }

    #[test]
    fn unique_wants_of_no_rules_is_empty() {
        assert!(unique_wants(&[]).unwrap().is_empty());
    }
}
