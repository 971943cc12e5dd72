//! Ingresses should have heimdall alerts configured.

use async_trait::async_trait;
use k8s_openapi::api::networking::v1::Ingress;
use tracing::debug;

use klaxon_engine::{alertf, wants, Context, Handler, Rule};

pub const HEIMDALL_PREFIX: &str = "com.uswitch.heimdall";

pub fn has_alert_annotation(ingress: &Ingress) -> bool {
    ingress
        .metadata
        .annotations
        .as_ref()
        .is_some_and(|annotations| annotations.keys().any(|key| key.starts_with(HEIMDALL_PREFIX)))
}

pub struct IngressNeedsAlerts;

#[async_trait]
impl Handler<Ingress> for IngressNeedsAlerts {
    async fn handle(&self, _old: Option<&Ingress>, ingress: &Ingress, ctx: &Context) {
        if has_alert_annotation(ingress) {
            return;
        }
        let namespace = crate::namespace_of(&ingress.metadata);
        let name = ingress.metadata.name.as_deref().unwrap_or_default();
        debug!(namespace = %namespace, name = %name, "ingress has no heimdall annotations");

        alertf!(
            ctx,
            ingress,
            "You don't have any alerts set up for your ingress: {namespace}.{name}. \
             You may want to check https://github.com/uswitch/heimdall for more info."
        )
        .await;
    }
}

pub fn rule() -> Rule {
    Rule::builder("ingress-needs-alerts")
        .watch(wants::ingresses(), IngressNeedsAlerts)
        .build()
}
