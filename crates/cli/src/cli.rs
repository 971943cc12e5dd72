use clap::Parser;

use klaxon_core::Config;

/// Watch a Kubernetes cluster and alert on policy violations.
///
/// Every flag falls back to its environment variable, then to the
/// built-in default.
#[derive(Parser, Debug, Default)]
#[command(name = "klaxon", version, about)]
pub struct CliArgs {
    /// Path to kubeconfig. When unset, uses in-cluster config or the
    /// `KUBECONFIG` / default kubeconfig files.
    #[arg(long)]
    pub kubeconfig: Option<String>,

    /// Namespace to monitor (all namespaces when unset)
    #[arg(long)]
    pub namespace: Option<String>,

    /// Discard adds for resources older than n minutes at startup. 0 disables.
    #[arg(long)]
    pub age_limit: Option<u64>,

    /// Seconds to wait for each watch's initial list
    #[arg(long)]
    pub sync_timeout: Option<u64>,

    /// Debug logging
    #[arg(long)]
    pub debug: bool,

    /// Log as JSON
    #[arg(long)]
    pub json: bool,

    /// Slack bot token. Slack delivery is disabled without one.
    #[arg(long, env = "SLACK_TOKEN", hide_env_values = true)]
    pub slack_token: Option<String>,

    #[arg(long, env = "AWS_REGION")]
    pub aws_region: Option<String>,
}

impl CliArgs {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.kubeconfig {
            config.kubeconfig = Some(path.clone());
        }
        if let Some(ns) = &self.namespace {
            config.namespace = Some(ns.clone()).filter(|ns| !ns.is_empty());
        }
        if let Some(minutes) = self.age_limit {
            config.age_limit_minutes = minutes;
        }
        if let Some(secs) = self.sync_timeout {
            config.sync_timeout_secs = secs;
        }
        if let Some(token) = &self.slack_token {
            config.slack_token = Some(token.clone()).filter(|t| !t.is_empty());
        }
        if let Some(region) = &self.aws_region {
            config.aws_region = region.clone();
        }
        config.debug |= self.debug;
        config.json_logs |= self.json;
    }
}
