//! klaxon: watches cluster objects, runs the built-in policy rules and
//! routes their alerts to the sinks named by annotations.

mod cli;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use klaxon_core::config::load_dotenv;
use klaxon_core::Config;
use klaxon_engine::{Engine, EngineConfig, KubeSource, Registry};
use klaxon_notify::{SlackSink, SnsSink, WebhookSink};

use crate::cli::CliArgs;

fn init_tracing(config: &Config) {
    let filter = if config.debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    if config.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn kube_client(config: &Config) -> Result<Client> {
    let Some(path) = config.kubeconfig.as_deref() else {
        return Client::try_default()
            .await
            .context("failed to infer cluster config");
    };
    let kubeconfig = Kubeconfig::read_from(path)
        .with_context(|| format!("failed to read kubeconfig {path}"))?;
    let client_config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .context("invalid kubeconfig")?;
    Client::try_from(client_config).context("failed to create cluster client")
}

/// Wait for SIGINT or SIGTERM (Unix) or Ctrl+C elsewhere.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT");
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM");
        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl_c");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let args = CliArgs::parse();

    let mut config = Config::from_env().context("invalid environment configuration")?;
    args.apply(&mut config);

    init_tracing(&config);
    debug!("Debug logging enabled");
    config.log_summary();
    debug!(config = %config.redacted_summary(), "effective configuration");

    let client = kube_client(&config).await?;

    let iam = klaxon_rules::iam_role::iam_client(&config.aws_region).await;
    let mut registry = Registry::builder();
    for rule in klaxon_rules::all(iam) {
        registry = registry.rule(rule);
    }

    match config.slack_token.as_deref() {
        Some(token) => registry = registry.sink(Arc::new(SlackSink::new(token)?)),
        None => warn!("SLACK_TOKEN not set, slack delivery disabled"),
    }
    registry = registry
        .sink(Arc::new(SnsSink::from_region(config.aws_region.clone()).await))
        .sink(Arc::new(WebhookSink::new()));

    let source = KubeSource::new(client.clone());
    let engine = Engine::new(source, registry.build(), EngineConfig::from(&config)).with_client(client);

    let cancel = CancellationToken::new();
    let running = engine.start(cancel.clone()).await?;
    info!("klaxon running");

    shutdown_signal().await;
    info!("shutdown requested");
    running.shutdown().await;

    Ok(())
}
