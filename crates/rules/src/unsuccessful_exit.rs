//! Alerts on containers that terminated with a failure exit code.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, LogParams};
use kube::Client;
use tracing::{debug, error};

use klaxon_engine::{alertf, wants, Context, Handler, Rule};

use crate::error::RuleError;

/// How far back to read a failed container's logs.
const LOG_WINDOW_SECS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitVerdict {
    /// 0, or 143 from a JVM handling SIGTERM.
    Clean,
    /// 137: the process was SIGKILLed.
    Killed,
    Failed(i32),
}

pub fn verdict(exit_code: i32) -> ExitVerdict {
    match exit_code {
        0 | 143 => ExitVerdict::Clean,
        137 => ExitVerdict::Killed,
        code => ExitVerdict::Failed(code),
    }
}

/// (container, exit code) for every terminated container of `pod`.
pub fn terminated(pod: &Pod) -> Vec<(&str, i32)> {
    pod.status
        .iter()
        .flat_map(|status| status.container_statuses.iter().flatten())
        .filter_map(|cs| {
            let terminated = cs.state.as_ref()?.terminated.as_ref()?;
            Some((cs.name.as_str(), terminated.exit_code))
        })
        .collect()
}

async fn recent_logs(client: &Client, namespace: &str, pod: &str, container: &str) -> Result<String, RuleError> {
    let api: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let params = LogParams {
        container: Some(container.to_string()),
        since_seconds: Some(LOG_WINDOW_SECS),
        ..LogParams::default()
    };
    Ok(api.logs(pod, &params).await?)
}

pub struct UnsuccessfulExit;

#[async_trait]
impl Handler<Pod> for UnsuccessfulExit {
    async fn handle(&self, _old: Option<&Pod>, pod: &Pod, ctx: &Context) {
        let namespace = crate::namespace_of(&pod.metadata);
        let name = pod.metadata.name.as_deref().unwrap_or_default();

        for (container, code) in terminated(pod) {
            match verdict(code) {
                ExitVerdict::Clean => {}
                ExitVerdict::Killed => {
                    alertf!(
                        ctx,
                        pod,
                        "Pod `{namespace}.{name}` (container: `{container}`) was killed by a SIGKILL. \
                         Please make sure you gracefully shut down in time or extend \
                         `terminationGracePeriodSeconds` on your pod."
                    )
                    .await;
                }
                ExitVerdict::Failed(code) => {
                    if let Some(client) = ctx.client() {
                        match recent_logs(client, namespace, name, container).await {
                            Ok(logs) => {
                                for line in logs.lines() {
                                    debug!(pod = %name, container = %container, "log: {line}");
                                }
                            }
                            Err(e) => error!(pod = %name, container = %container, error = %e, "error retrieving pod logs"),
                        }
                    }
                    alertf!(
                        ctx,
                        pod,
                        "Pod `{namespace}.{name}` (container: `{container}`) has failed with exit code: `{code}`"
                    )
                    .await;
                }
            }
        }
    }
}

pub fn rule() -> Rule {
    Rule::builder("unsuccessful-exit")
        .watch(wants::pods(), UnsuccessfulExit)
        .build()
}
