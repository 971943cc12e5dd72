//! Built-in cluster policy rules.
//!
//! This crate provides:
//! - `unsuccessful-exit`: containers terminating with a failure exit code
//! - `resource-requests-limits`: deployment containers without cpu/memory requests and limits
//! - `scrape-needs-ports`: scraped deployments exposing no container ports
//! - `valid-iam-role`: pod IAM role annotations naming roles that do not exist
//! - `cronjob-history-limits`: cronjobs keeping too much job history
//! - `ingress-needs-alerts`: ingresses without heimdall alert annotations

pub mod cronjob_history;
pub mod error;
pub mod iam_role;
pub mod ingress_alerts;
pub mod resources;
pub mod scrape_ports;
pub mod unsuccessful_exit;

#[cfg(test)]
pub(crate) mod testing;

use k8s_openapi::api::apps::v1::Deployment;
use klaxon_engine::Rule;

pub use error::RuleError;
pub use iam_role::RoleDirectory;

/// Every built-in rule, checking IAM roles against `roles`.
pub fn all<D: RoleDirectory + 'static>(roles: D) -> Vec<Rule> {
    vec![
        unsuccessful_exit::rule(),
        resources::rule(),
        scrape_ports::rule(),
        iam_role::rule(roles),
        cronjob_history::rule(),
        ingress_alerts::rule(),
    ]
}

/// Name used in messages about a deployment's pods: the template name if
/// set, otherwise the deployment's own.
pub(crate) fn pod_name(deployment: &Deployment) -> &str {
    deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.template.metadata.as_ref())
        .and_then(|meta| meta.name.as_deref())
        .or(deployment.metadata.name.as_deref())
        .unwrap_or_default()
}

pub(crate) fn namespace_of(meta: &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta) -> &str {
    meta.namespace.as_deref().unwrap_or_default()
}
