use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("IAM lookup failed: {0}")]
    Iam(String),
}
