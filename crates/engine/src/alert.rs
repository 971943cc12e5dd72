//! Alerts and the object snapshot they carry.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use kube::Resource;

use crate::rule::{RuleId, RuleMeta};

/// What the router and dedup filter need to know about the affected object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectRef {
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
    /// Empty when the object has no UID yet.
    pub uid: String,
    pub resource_version: Option<String>,
    pub annotations: BTreeMap<String, String>,
}

impl ObjectRef {
    pub fn from_resource<R>(object: &R) -> Self
    where
        R: Resource<DynamicType = ()>,
    {
        let meta = object.meta();
        Self {
            kind: R::kind(&()).into_owned(),
            namespace: meta.namespace.clone(),
            name: meta.name.clone().unwrap_or_default(),
            uid: meta.uid.clone().unwrap_or_default(),
            resource_version: meta.resource_version.clone(),
            annotations: meta.annotations.clone().unwrap_or_default(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// One detected policy condition: which rule, which object, what message.
#[derive(Debug, Clone)]
pub struct Alert {
    pub rule: Arc<RuleMeta>,
    pub object: ObjectRef,
    pub message: String,
}

impl Alert {
    pub fn new(rule: Arc<RuleMeta>, object: ObjectRef, message: impl Into<String>) -> Self {
        Self {
            rule,
            object,
            message: message.into(),
        }
    }

    /// Debounce key: the same rule reporting on the same object.
    pub fn identity(&self) -> Identity {
        Identity {
            rule: self.rule.id,
            uid: self.object.uid.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub rule: RuleId,
    pub uid: String,
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.rule, self.uid)
    }
}
