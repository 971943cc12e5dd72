//! Asks for cpu and memory requests and limits on every deployment container.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Container;
use tracing::debug;

use klaxon_engine::{alertf, wants, Context, Handler, Rule};

const REQUIRED: [&str; 2] = ["cpu", "memory"];

fn fully_specified(container: &Container) -> bool {
    let Some(resources) = container.resources.as_ref() else {
        return false;
    };
    let has_all = |list: Option<&std::collections::BTreeMap<String, _>>| {
        list.is_some_and(|list| REQUIRED.iter().all(|key| list.contains_key(*key)))
    };
    has_all(resources.requests.as_ref()) && has_all(resources.limits.as_ref())
}

/// Names of the containers missing any request or limit.
pub fn containers_in_violation(deployment: &Deployment) -> Vec<String> {
    deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.template.spec.as_ref())
        .map(|pod| {
            pod.containers
                .iter()
                .filter(|c| !fully_specified(c))
                .map(|c| c.name.clone())
                .collect()
        })
        .unwrap_or_default()
}

pub struct ResourceRequestsLimits;

#[async_trait]
impl Handler<Deployment> for ResourceRequestsLimits {
    async fn handle(&self, old: Option<&Deployment>, new: &Deployment, ctx: &Context) {
        let namespace = crate::namespace_of(&new.metadata);
        let pod = crate::pod_name(new);
        let now = containers_in_violation(new);

        if old.is_some_and(|old| containers_in_violation(old) == now) {
            debug!(namespace = %namespace, pod = %pod, "resource requests and limits unchanged");
            return;
        }

        if now.is_empty() {
            if old.is_some() {
                alertf!(ctx, new, "Thanks for sorting your resource requests and limits on {namespace}.{pod}!").await;
            }
            return;
        }

        alertf!(
            ctx,
            new,
            "Please add resource requests and limits to the containers ({}) part of {namespace}.{pod}",
            now.join(", ")
        )
        .await;
    }
}

pub fn rule() -> Rule {
    Rule::builder("resource-requests-limits")
        .watch(wants::deployments(), ResourceRequestsLimits)
        .build()
}
