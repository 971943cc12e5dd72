//! Engine lifecycle: plan the shared watches, seed the namespace cache,
//! wire dispatch → dedup → routing, then wait for every watch to sync.

use std::sync::Arc;
use std::time::Duration;

use kube::Client;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::alert::Alert;
use crate::dispatch::Dispatcher;
use crate::error::EngineError;
use crate::filter::spawn_filter;
use crate::multiplex::WatchPlan;
use crate::namespaces::NamespaceCache;
use crate::registry::Registry;
use crate::router::OutputRouter;
use crate::source::WatchSource;
use crate::want::wants;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Restrict namespaced watches to one namespace.
    pub namespace: Option<String>,
    /// Adds older than this at startup are not dispatched. Zero disables.
    pub age_limit: Duration,
    /// How long to wait for each initial list before carrying on.
    pub sync_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            age_limit: Duration::from_secs(5 * 60),
            sync_timeout: Duration::from_secs(60),
        }
    }
}

impl From<&klaxon_core::Config> for EngineConfig {
    fn from(config: &klaxon_core::Config) -> Self {
        Self {
            namespace: config.namespace.clone(),
            age_limit: config.age_limit(),
            sync_timeout: config.sync_timeout(),
        }
    }
}

pub struct Engine<S> {
    source: Arc<S>,
    registry: Registry,
    config: EngineConfig,
    client: Option<Client>,
}

impl<S: WatchSource> Engine<S> {
    pub fn new(source: S, registry: Registry, config: EngineConfig) -> Self {
        Self {
            source: Arc::new(source),
            registry,
            config,
            client: None,
        }
    }

    /// Client handed to rule handlers through their [`Context`](crate::Context).
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Start every worker and return once all watches have synced or the
    /// sync timeout has passed.
    pub async fn start(self, cancel: CancellationToken) -> Result<RunningEngine, EngineError> {
        if self.registry.rules().is_empty() {
            return Err(EngineError::NoRules);
        }
        let (rules, sinks) = self.registry.into_parts();
        let plan = WatchPlan::build(&rules)?;
        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        // Namespace cache first, it has its own watch independent of the plan.
        let cache = NamespaceCache::new();
        let (ns_synced_tx, ns_synced_rx) = oneshot::channel();
        let ns_events = self.source.watch(wants::namespaces().target(), None);
        tasks.push(tokio::spawn(cache.clone().sync(ns_events, ns_synced_tx, cancel.clone())));

        let namespaces = match timeout(self.config.sync_timeout, ns_synced_rx).await {
            Ok(Ok(())) => Some(cache),
            Ok(Err(_)) => {
                error!("namespace watch stopped before syncing, continuing without namespace defaults");
                None
            }
            Err(_) => {
                error!(
                    timeout_secs = self.config.sync_timeout.as_secs(),
                    "timed out syncing namespaces, continuing without namespace defaults"
                );
                None
            }
        };

        // Downstream stages must be running before any handler can emit.
        let (alerts_tx, alerts_rx) = mpsc::channel::<Alert>(1);
        let (filtered, filter_task) = spawn_filter(alerts_rx, cancel.clone());
        tasks.push(filter_task);

        let router = OutputRouter::new(sinks, namespaces.clone());
        tasks.push(tokio::spawn(router.run(filtered, cancel.clone())));

        let mut pending = Vec::with_capacity(plan.len());
        for kind in plan.into_kinds() {
            let name = kind.target.name().to_string();
            let scope = kind.target.scoped(self.config.namespace.as_deref());
            info!(
                kind = %name,
                namespace = scope.unwrap_or("(all)"),
                subscribers = kind.subscriptions.len(),
                "Adding a shared watch for {name}"
            );

            let events = self.source.watch(&kind.target, scope);
            let (synced_tx, synced_rx) = oneshot::channel();
            let dispatcher = Dispatcher::new(
                kind,
                alerts_tx.clone(),
                self.client.clone(),
                self.config.age_limit,
            );
            tasks.push(tokio::spawn(dispatcher.run(events, synced_tx, cancel.clone())));
            pending.push((name, synced_rx));
        }
        drop(alerts_tx);

        let deadline = Instant::now() + self.config.sync_timeout;
        for (name, synced) in pending {
            match timeout_at(deadline, synced).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => warn!(kind = %name, "watch stopped before syncing"),
                Err(_) => error!(kind = %name, "timed out waiting for initial sync"),
            }
        }

        info!(rules = rules.len(), tasks = tasks.len(), "engine started");

        Ok(RunningEngine {
            cancel,
            tasks,
            namespaces,
        })
    }

    /// Start and run until `cancel` fires and every worker has stopped.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), EngineError> {
        self.start(cancel).await?.join().await;
        Ok(())
    }
}

pub struct RunningEngine {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    namespaces: Option<NamespaceCache>,
}

impl RunningEngine {
    /// `None` when the namespace cache failed its initial sync.
    pub fn namespaces(&self) -> Option<&NamespaceCache> {
        self.namespaces.as_ref()
    }

    /// Cancel and wait for every worker.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.join().await;
    }

    /// Wait for every worker to stop.
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "engine task panicked");
            }
        }
        info!("engine stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySource;

    #[tokio::test]
    async fn starting_without_rules_fails() {
        let engine = Engine::new(
            MemorySource::new(),
            Registry::builder().build(),
            EngineConfig::default(),
        );
        let err = engine.start(CancellationToken::new()).await.err();
        assert!(matches!(err, Some(EngineError::NoRules)));
    }

    #[test]
    fn config_converts_from_core_config() {
        let core = klaxon_core::Config {
            namespace: Some("shop".into()),
            age_limit_minutes: 0,
            sync_timeout_secs: 3,
            ..Default::default()
        };
        let config = EngineConfig::from(&core);
        assert_eq!(config.namespace.as_deref(), Some("shop"));
        assert!(config.age_limit.is_zero());
        assert_eq!(config.sync_timeout, Duration::from_secs(3));
    }
}
