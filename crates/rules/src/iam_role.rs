//! Pod IAM role annotations must name a role that exists.

use std::sync::Arc;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_iam::error::DisplayErrorContext;
use k8s_openapi::api::apps::v1::Deployment;
use tracing::{debug, error};

use klaxon_engine::{alertf, wants, Context, Handler, Rule};

use crate::error::RuleError;

pub const ROLE_ANNOTATION: &str = "iam.amazonaws.com/role";

/// Where roles are looked up.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    /// `Ok(false)` only when the directory positively reports the role as missing.
    async fn role_exists(&self, name: &str) -> Result<bool, RuleError>;
}

#[async_trait]
impl RoleDirectory for aws_sdk_iam::Client {
    async fn role_exists(&self, name: &str) -> Result<bool, RuleError> {
        match self.get_role().role_name(name).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_entity_exception()) => Ok(false),
            Err(e) => Err(RuleError::Iam(DisplayErrorContext(e).to_string())),
        }
    }
}

/// IAM client for `region` using the default credential chain.
pub async fn iam_client(region: &str) -> aws_sdk_iam::Client {
    let config = aws_config::defaults(BehaviorVersion::latest())
        .region(aws_config::Region::new(region.to_string()))
        .load()
        .await;
    aws_sdk_iam::Client::new(&config)
}

/// Role named by the pod template, if any.
pub fn requested_role(deployment: &Deployment) -> Option<&str> {
    deployment
        .spec
        .as_ref()?
        .template
        .metadata
        .as_ref()?
        .annotations
        .as_ref()?
        .get(ROLE_ANNOTATION)
        .map(String::as_str)
        .filter(|role| !role.is_empty())
}

pub struct ValidIamRole<D> {
    roles: Arc<D>,
}

impl<D: RoleDirectory> ValidIamRole<D> {
    pub fn new(roles: D) -> Self {
        Self {
            roles: Arc::new(roles),
        }
    }
}

#[async_trait]
impl<D: RoleDirectory + 'static> Handler<Deployment> for ValidIamRole<D> {
    async fn handle(&self, _old: Option<&Deployment>, deployment: &Deployment, ctx: &Context) {
        let Some(role) = requested_role(deployment) else {
            return;
        };
        let namespace = crate::namespace_of(&deployment.metadata);
        let name = deployment.metadata.name.as_deref().unwrap_or_default();

        match self.roles.role_exists(role).await {
            Ok(true) => debug!(namespace = %namespace, name = %name, role = %role, "iam role exists"),
            Ok(false) => {
                alertf!(ctx, deployment, "IAM role {role} specified for pods but doesn't exist").await;
            }
            Err(e) => error!(namespace = %namespace, name = %name, role = %role, error = %e, "error finding role"),
        }
    }
}

pub fn rule<D: RoleDirectory + 'static>(roles: D) -> Rule {
    Rule::builder("valid-iam-role")
        .watch(wants::deployments(), ValidIamRole::new(roles))
        .build()
}
