//! Deployments asking to be scraped by Prometheus must expose a port.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use tracing::debug;

use klaxon_engine::{alertf, wants, Context, Handler, Rule};

pub const SCRAPE_ANNOTATION: &str = "prometheus.io.scrape";

/// False only when the pod template is annotated for scraping and no
/// container declares a port.
pub fn valid_scrape_and_ports(deployment: &Deployment) -> bool {
    let Some(template) = deployment.spec.as_ref().map(|spec| &spec.template) else {
        return true;
    };
    let scraped = template
        .metadata
        .as_ref()
        .and_then(|meta| meta.annotations.as_ref())
        .is_some_and(|annotations| annotations.contains_key(SCRAPE_ANNOTATION));
    let has_ports = template.spec.as_ref().is_some_and(|pod| {
        pod.containers
            .iter()
            .any(|c| c.ports.as_ref().is_some_and(|ports| !ports.is_empty()))
    });
    !scraped || has_ports
}

pub struct ScrapeNeedsPorts;

#[async_trait]
impl Handler<Deployment> for ScrapeNeedsPorts {
    async fn handle(&self, old: Option<&Deployment>, new: &Deployment, ctx: &Context) {
        let namespace = crate::namespace_of(&new.metadata);
        let pod = crate::pod_name(new);
        let valid = valid_scrape_and_ports(new);

        if old.is_some_and(|old| valid_scrape_and_ports(old) == valid) {
            debug!(namespace = %namespace, pod = %pod, "scrape ports unchanged");
            return;
        }

        if !valid {
            alertf!(ctx, new, "{namespace}.{pod} wants to be scraped so it needs to expose some ports").await;
        } else if old.is_some() {
            alertf!(ctx, new, "Thanks for sorting the ports for scraping on {namespace}.{pod}").await;
        }
    }
}

pub fn rule() -> Rule {
    Rule::builder("scrape-needs-ports")
        .watch(wants::deployments(), ScrapeNeedsPorts)
        .build()
}
