//! Immediate-predecessor debounce over (rule, object) identities.
//!
//! An alert is forwarded when its identity has no recorded message or the
//! recorded message differs; either way the new message becomes the
//! recorded one. [A, A, A] forwards A once; [A, B, A] forwards all three.
//!
//! The last-seen map is never pruned: it grows with the number of distinct
//! (rule, object) pairs seen during the run.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::alert::{Alert, Identity};

#[derive(Debug, Default)]
pub struct DedupFilter {
    last_seen: HashMap<Identity, String>,
}

impl DedupFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `alert` and report whether it should be forwarded.
    pub fn admit(&mut self, alert: &Alert) -> bool {
        match self.last_seen.insert(alert.identity(), alert.message.clone()) {
            Some(previous) => previous != alert.message,
            None => true,
        }
    }

    /// Number of identities seen so far.
    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }

    /// Filter `input` into `output` until `cancel` fires or either side
    /// closes.
    pub async fn run(
        mut self,
        mut input: mpsc::Receiver<Alert>,
        output: mpsc::Sender<Alert>,
        cancel: CancellationToken,
    ) {
        loop {
            let alert = tokio::select! {
                _ = cancel.cancelled() => break,
                alert = input.recv() => match alert {
                    Some(alert) => alert,
                    None => break,
                },
            };

            if !self.admit(&alert) {
                debug!(identity = %alert.identity(), rule = %alert.rule.name, "Alert filtered");
                continue;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                sent = output.send(alert) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }

        debug!(identities = self.len(), "alert filter stopped");
    }
}

/// Start a filter task over `input`, returning its output stream.
pub fn spawn_filter(
    input: mpsc::Receiver<Alert>,
    cancel: CancellationToken,
) -> (mpsc::Receiver<Alert>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(1);
    let handle = tokio::spawn(DedupFilter::new().run(input, tx, cancel));
    (rx, handle)
}
