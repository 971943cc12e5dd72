use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use klaxon_engine::{
    alertf, wants, Context, Engine, EngineConfig, Handler, MemorySource, Registry, Rule,
    RunningEngine, WatchEvent,
};
use klaxon_notify::{NotifyError, Sink};
use kube::core::DynamicObject;
use tokio_util::sync::CancellationToken;

/// Alerts on every pod with the value of its `msg` annotation.
struct Echo;

#[async_trait]
impl Handler<Pod> for Echo {
    async fn handle(&self, _old: Option<&Pod>, new: &Pod, ctx: &Context) {
        let msg = new
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get("msg"))
            .cloned()
            .unwrap_or_else(|| "no message".to_string());
        alertf!(ctx, new, "{}: {}", ctx.rule().name, msg).await;
    }
}

struct Recorder {
    key: &'static str,
    sent: Mutex<Vec<(String, String)>>,
}

impl Recorder {
    fn new(key: &'static str) -> Arc<Self> {
        Arc::new(Self {
            key,
            sent: Mutex::new(Vec::new()),
        })
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    async fn wait_for(&self, n: usize) -> Vec<(String, String)> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let sent = self.sent();
                if sent.len() >= n {
                    return sent;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("deliveries did not arrive in time")
    }
}

#[async_trait]
impl Sink for Recorder {
    fn key(&self) -> &str {
        self.key
    }

    async fn send(&self, destination: &str, message: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((destination.to_string(), message.to_string()));
        Ok(())
    }
}

fn pod(name: &str, created: &str, annotations: serde_json::Value) -> DynamicObject {
    serde_json::from_value(serde_json::json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {
            "name": name,
            "namespace": "shop",
            "uid": format!("uid-{name}"),
            "creationTimestamp": created,
            "annotations": annotations
        }
    }))
    .unwrap()
}

fn fresh() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

fn namespace(name: &str, annotations: serde_json::Value) -> DynamicObject {
    serde_json::from_value(serde_json::json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": { "name": name, "annotations": annotations }
    }))
    .unwrap()
}

fn config() -> EngineConfig {
    EngineConfig {
        sync_timeout: Duration::from_millis(500),
        ..Default::default()
    }
}

async fn start(source: &MemorySource, registry: Registry) -> RunningEngine {
    Engine::new(source.clone(), registry, config())
        .start(CancellationToken::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn rules_sharing_a_kind_share_one_watch() {
    let source = MemorySource::new();
    source.push("namespaces", WatchEvent::Synced);
    source.push("pods", WatchEvent::Synced);

    let registry = Registry::builder()
        .rule(Rule::builder("one").watch(wants::pods(), Echo).build())
        .rule(Rule::builder("two").watch(wants::pods(), Echo).build())
        .rule(Rule::builder("three").watch(wants::pods(), Echo).build())
        .build();

    let engine = start(&source, registry).await;

    assert_eq!(source.opened("pods"), 1);
    assert_eq!(source.opened("namespaces"), 1);
    assert_eq!(source.total_opened(), 2);
    engine.shutdown().await;
}

#[tokio::test]
async fn alerts_route_through_namespace_and_object_annotations() {
    let source = MemorySource::new();
    source.push(
        "namespaces",
        WatchEvent::Added(namespace(
            "shop",
            serde_json::json!({ "com.uswitch.alert/slack": "#ns-channel" }),
        )),
    );
    source.push("namespaces", WatchEvent::Synced);
    source.push("pods", WatchEvent::Synced);

    let slack = Recorder::new("slack");
    let sns = Recorder::new("sns");
    let registry = Registry::builder()
        .rule(Rule::builder("echo").watch(wants::pods(), Echo).build())
        .sink(slack.clone())
        .sink(sns.clone())
        .build();
    let engine = start(&source, registry).await;
    assert!(engine.namespaces().is_some());

    source.push(
        "pods",
        WatchEvent::Added(pod(
            "web",
            &fresh(),
            serde_json::json!({ "msg": "hi", "com.uswitch.alert/sns": "arn:topic" }),
        )),
    );

    assert_eq!(
        slack.wait_for(1).await,
        vec![("#ns-channel".to_string(), "echo: hi".to_string())]
    );
    assert_eq!(
        sns.wait_for(1).await,
        vec![("arn:topic".to_string(), "echo: hi".to_string())]
    );
    engine.shutdown().await;
}

#[tokio::test]
async fn repeated_alerts_are_delivered_once_until_they_change() {
    let source = MemorySource::new();
    source.push("namespaces", WatchEvent::Synced);
    source.push("pods", WatchEvent::Synced);

    let slack = Recorder::new("slack");
    let registry = Registry::builder()
        .rule(Rule::builder("echo").watch(wants::pods(), Echo).build())
        .sink(slack.clone())
        .build();
    let engine = start(&source, registry).await;

    let created = fresh();
    let with = |msg: &str| {
        pod(
            "web",
            &created,
            serde_json::json!({ "msg": msg, "com.uswitch.alert/slack": "#c" }),
        )
    };
    source.push("pods", WatchEvent::Added(with("a")));
    for msg in ["a", "a", "b", "a"] {
        source.push(
            "pods",
            WatchEvent::Updated {
                old: with("a"),
                new: with(msg),
            },
        );
    }

    let sent = slack.wait_for(3).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let messages: Vec<_> = slack.sent().into_iter().map(|(_, m)| m).collect();
    assert_eq!(sent.len(), 3);
    assert_eq!(messages, vec!["echo: a", "echo: b", "echo: a"]);
    engine.shutdown().await;
}

#[tokio::test]
async fn stale_adds_are_not_dispatched() {
    let source = MemorySource::new();
    source.push("namespaces", WatchEvent::Synced);
    source.push(
        "pods",
        WatchEvent::Added(pod(
            "old",
            "2000-01-01T00:00:00Z",
            serde_json::json!({ "msg": "old", "com.uswitch.alert/slack": "#c" }),
        )),
    );
    source.push("pods", WatchEvent::Synced);

    let slack = Recorder::new("slack");
    let registry = Registry::builder()
        .rule(Rule::builder("echo").watch(wants::pods(), Echo).build())
        .sink(slack.clone())
        .build();
    let engine = start(&source, registry).await;

    source.push(
        "pods",
        WatchEvent::Added(pod(
            "new",
            &fresh(),
            serde_json::json!({ "msg": "new", "com.uswitch.alert/slack": "#c" }),
        )),
    );

    let sent = slack.wait_for(1).await;
    assert_eq!(sent, vec![("#c".to_string(), "echo: new".to_string())]);
    engine.shutdown().await;
}

#[tokio::test]
async fn missing_namespace_sync_degrades_to_object_annotations() {
    let source = MemorySource::new();
    source.push("pods", WatchEvent::Synced);

    let slack = Recorder::new("slack");
    let registry = Registry::builder()
        .rule(Rule::builder("echo").watch(wants::pods(), Echo).build())
        .sink(slack.clone())
        .build();
    let engine = start(&source, registry).await;
    assert!(engine.namespaces().is_none());

    source.push(
        "pods",
        WatchEvent::Added(pod(
            "web",
            &fresh(),
            serde_json::json!({ "msg": "hi", "com.uswitch.alert/slack": "#c" }),
        )),
    );
    assert_eq!(slack.wait_for(1).await.len(), 1);
    engine.shutdown().await;
}

#[tokio::test]
async fn namespace_scope_reaches_the_source() {
    let source = MemorySource::new();
    source.push("namespaces", WatchEvent::Synced);
    source.push("pods", WatchEvent::Synced);

    let slack = Recorder::new("slack");
    let registry = Registry::builder()
        .rule(Rule::builder("echo").watch(wants::pods(), Echo).build())
        .sink(slack.clone())
        .build();
    let config = EngineConfig {
        namespace: Some("shop".to_string()),
        ..config()
    };
    let engine = Engine::new(source.clone(), registry, config)
        .start(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(source.scopes("pods"), vec![Some("shop".to_string())]);
    assert_eq!(source.scopes("namespaces"), vec![None]);

    let mut elsewhere = pod(
        "stray",
        &fresh(),
        serde_json::json!({ "msg": "stray", "com.uswitch.alert/slack": "#c" }),
    );
    elsewhere.metadata.namespace = Some("other".to_string());
    source.push("pods", WatchEvent::Added(elsewhere));
    source.push(
        "pods",
        WatchEvent::Added(pod(
            "web",
            &fresh(),
            serde_json::json!({ "msg": "mine", "com.uswitch.alert/slack": "#c" }),
        )),
    );

    assert_eq!(
        slack.wait_for(1).await,
        vec![("#c".to_string(), "echo: mine".to_string())]
    );
    engine.shutdown().await;
}

#[tokio::test]
async fn cancellation_stops_every_worker() {
    let source = MemorySource::new();
    source.push("namespaces", WatchEvent::Synced);
    source.push("pods", WatchEvent::Synced);

    let cancel = CancellationToken::new();
    let registry = Registry::builder()
        .rule(Rule::builder("echo").watch(wants::pods(), Echo).build())
        .build();
    let engine = Engine::new(source.clone(), registry, config());
    let run = tokio::spawn(engine.run(cancel.clone()));

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .expect("engine did not stop")
        .unwrap();
    assert!(result.is_ok());
}
