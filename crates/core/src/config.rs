use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    match env_opt(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
            key: key.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}

fn env_bool(key: &str) -> Result<bool, ConfigError> {
    match env_opt(key).as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("0") | Some("false") | Some("no") => Ok(false),
        Some("1") | Some("true") | Some("yes") => Ok(true),
        Some(other) => Err(ConfigError::InvalidBool {
            key: key.to_string(),
            value: other.to_string(),
        }),
    }
}

// ── Top-level config ──────────────────────────────────────────

/// Process configuration. Built from the environment first, then
/// overridden field by field from command-line flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Namespace to watch; `None` watches every namespace.
    pub namespace: Option<String>,
    /// Add events for objects older than this many minutes are
    /// treated as pre-existing and skipped. 0 disables the check.
    pub age_limit_minutes: u64,
    /// How long to wait for each watch's initial list.
    pub sync_timeout_secs: u64,
    /// Explicit kubeconfig path, set only by `--kubeconfig`. `None` defers
    /// to kube's own inference, which honors a `KUBECONFIG` path list.
    pub kubeconfig: Option<String>,
    /// Slack bot token. The slack sink is only registered when set.
    pub slack_token: Option<String>,
    pub aws_region: String,
    pub debug: bool,
    pub json_logs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: None,
            age_limit_minutes: 5,
            sync_timeout_secs: 60,
            kubeconfig: None,
            slack_token: None,
            aws_region: "eu-west-1".to_string(),
            debug: false,
            json_logs: false,
        }
    }
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            namespace: env_opt("KLAXON_NAMESPACE"),
            age_limit_minutes: env_u64("KLAXON_AGE_LIMIT", defaults.age_limit_minutes)?,
            sync_timeout_secs: env_u64("KLAXON_SYNC_TIMEOUT", defaults.sync_timeout_secs)?,
            kubeconfig: None,
            slack_token: env_opt("SLACK_TOKEN"),
            aws_region: env_or("AWS_REGION", &defaults.aws_region),
            debug: env_bool("KLAXON_DEBUG")?,
            json_logs: env_bool("KLAXON_JSON_LOGS")?,
        })
    }

    pub fn age_limit(&self) -> Duration {
        Duration::from_secs(self.age_limit_minutes * 60)
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs)
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  namespace:    {}", self.namespace.as_deref().unwrap_or("(all)"));
        tracing::info!("  age limit:    {}m (0 = disabled)", self.age_limit_minutes);
        tracing::info!("  sync timeout: {}s", self.sync_timeout_secs);
        tracing::info!("  kubeconfig:   {}", self.kubeconfig.as_deref().unwrap_or("(inferred)"));
        tracing::info!("  slack:        {}", if self.slack_token.is_some() { "configured" } else { "disabled" });
        tracing::info!("  aws region:   {}", self.aws_region);
    }

    /// Return a redacted view safe for diagnostics (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "namespace": self.namespace,
            "age_limit_minutes": self.age_limit_minutes,
            "sync_timeout_secs": self.sync_timeout_secs,
            "kubeconfig": self.kubeconfig,
            "slack": { "configured": self.slack_token.is_some() },
            "aws": { "region": self.aws_region },
        })
    }
}
