//! Kubernetes context
//!
//! Bundles the cluster connection with the development configuration so
//! every step of the workflow gets both from one place.
//!
//! # Errors
//!
//! Fallible methods return [`ContextError`]. API failures keep their
//! [`ErrorKind`] alongside a readable message, so callers can tolerate the
//! expected ones (see [`crate::conditions`]) and surface the rest.

mod crud;
mod logs;
#[cfg(test)]
pub(crate) mod mock;
mod waiting;

pub use logs::forward_lines;
pub use waiting::{has_finished, has_started};

use crate::conditions::{Classify, ErrorKind};
use crate::config::DevConfig;
use kube::Client;
use std::fmt;

/// Cluster connection plus run configuration
///
/// # Example
///
/// ```ignore
/// use operator_e2e::{Context, DevConfig};
///
/// let ctx = Context::new(DevConfig::load("config.json")?).await?;
/// let pod: Pod = ctx.get("test-runner").await?;
/// ```
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Run configuration
    pub config: DevConfig,
}

/// A failed API call, classified
#[derive(Debug, Clone)]
pub struct ApiFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl ApiFailure {
    pub fn new(err: &kube::Error, resource_kind: &str, resource_name: &str) -> Self {
        Self {
            kind: err.kind(),
            message: improve_error_message(err, resource_kind, resource_name),
        }
    }
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Errors from Context operations
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("Failed to create Kubernetes client: {0}")]
    ClientError(String),

    #[error("Failed to create resource: {0}")]
    CreateError(ApiFailure),

    #[error("Failed to get resource: {0}")]
    GetError(ApiFailure),

    #[error("Failed to delete resource: {0}")]
    DeleteError(ApiFailure),

    #[error("Failed to list resources: {0}")]
    ListError(ApiFailure),

    #[error("Failed to get logs: {0}")]
    LogsError(ApiFailure),

    #[error("Log stream interrupted: {0}")]
    StreamError(#[from] std::io::Error),

    #[error("{0}")]
    WaitTimeout(#[from] crate::wait::WaitError),

    #[error("Invalid resource: {0}")]
    InvalidResource(String),
}

impl Classify for ContextError {
    fn kind(&self) -> ErrorKind {
        match self {
            ContextError::CreateError(f)
            | ContextError::GetError(f)
            | ContextError::DeleteError(f)
            | ContextError::ListError(f)
            | ContextError::LogsError(f) => f.kind,
            ContextError::ClientError(_) | ContextError::StreamError(_) => ErrorKind::Unavailable,
            ContextError::WaitTimeout(_) => ErrorKind::Timeout,
            ContextError::InvalidResource(_) => ErrorKind::Invalid,
        }
    }
}

impl Context {
    /// Connect using the ambient kubeconfig (`KUBECONFIG` or `~/.kube/config`)
    pub async fn new(config: DevConfig) -> Result<Self, ContextError> {
        let client = Client::try_default()
            .await
            .map_err(|e| ContextError::ClientError(e.to_string()))?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: DevConfig) -> Self {
        Self { client, config }
    }

    /// Namespace the run operates in
    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }
}

/// Improve a kube error message with human-readable context
///
/// Parses common Kubernetes error patterns and returns a more
/// understandable message. Includes resource name/kind context.
pub(crate) fn improve_error_message(
    err: &kube::Error,
    resource_kind: &str,
    resource_name: &str,
) -> String {
    match err.kind() {
        ErrorKind::NotFound => format!("{resource_kind} '{resource_name}' not found"),
        ErrorKind::AlreadyExists => format!("{resource_kind} '{resource_name}' already exists"),
        ErrorKind::Forbidden => {
            format!("{resource_kind} '{resource_name}': permission denied (check RBAC)")
        }
        ErrorKind::Unauthorized => {
            format!("{resource_kind} '{resource_name}': unauthorized (check kubeconfig credentials)")
        }
        _ => {
            let raw = err.to_string();
            if raw.contains("connection refused") || raw.contains("ECONNREFUSED") {
                return format!(
                    "{resource_kind} '{resource_name}': cannot connect to Kubernetes API"
                );
            }
            format!("{resource_kind} '{resource_name}': {raw}")
        }
    }
}
