//! The immutable rule and sink set the engine is started with.

use std::collections::HashMap;
use std::sync::Arc;

use klaxon_notify::Sink;
use tracing::warn;

use crate::rule::Rule;

/// Rules plus sinks keyed by [`Sink::key`]. Assembled once with
/// [`RegistryBuilder`] and handed to the engine by value.
pub struct Registry {
    rules: Vec<Rule>,
    sinks: HashMap<String, Arc<dyn Sink>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            rules: Vec::new(),
            sinks: HashMap::new(),
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub(crate) fn into_parts(self) -> (Vec<Rule>, HashMap<String, Arc<dyn Sink>>) {
        (self.rules, self.sinks)
    }
}

pub struct RegistryBuilder {
    rules: Vec<Rule>,
    sinks: HashMap<String, Arc<dyn Sink>>,
}

impl RegistryBuilder {
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Register a sink. A later sink with the same key replaces the earlier one.
    pub fn sink(mut self, sink: Arc<dyn Sink>) -> Self {
        let key = sink.key().to_string();
        if self.sinks.insert(key.clone(), sink).is_some() {
            warn!(sink = %key, "sink registered twice, keeping the latest");
        }
        self
    }

    pub fn build(self) -> Registry {
        Registry {
            rules: self.rules,
            sinks: self.sinks,
        }
    }
}
