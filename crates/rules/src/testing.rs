use tokio::sync::mpsc;

use klaxon_engine::{Context, Handler, Kind, Rule};

/// Run `handler` once with no cluster client and collect the messages it
/// alerts with.
pub(crate) async fn messages<K, H>(handler: &H, old: Option<&K>, new: &K) -> Vec<String>
where
    K: Kind,
    H: Handler<K>,
{
    let rule = Rule::builder("test").build();
    let (tx, mut rx) = mpsc::channel(16);
    let ctx = Context::new(rule.meta().clone(), tx, None);

    handler.handle(old, new, &ctx).await;
    drop(ctx);

    let mut out = Vec::new();
    while let Some(alert) = rx.recv().await {
        out.push(alert.message);
    }
    out
}

pub(crate) fn from_json<K: Kind>(value: serde_json::Value) -> K {
    serde_json::from_value(value).unwrap()
}
