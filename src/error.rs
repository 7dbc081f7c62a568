//! Error type for a full orchestration run

use crate::config::ConfigError;
use crate::context::ContextError;
use crate::image::ImageError;
use crate::kubeconfig::KubeconfigError;
use crate::manifest::ManifestError;
use thiserror::Error;

/// Any failure that stops a run
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Development config could not be loaded
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Local kubeconfig unusable
    #[error("kubeconfig error: {0}")]
    Kubeconfig(#[from] KubeconfigError),

    /// Kubernetes API call or wait failed
    #[error("kubernetes error: {0}")]
    Context(#[from] ContextError),

    /// Image build or push failed
    #[error("image error: {0}")]
    Image(#[from] ImageError),

    /// Deploy manifest missing or malformed
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// The test runner pod did not finish successfully
    #[error("tests failed: pod {pod} {reason}")]
    TestsFailed { pod: String, reason: String },
}

impl Error {
    /// Create a tests-failed error for the given pod
    pub fn tests_failed(pod: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TestsFailed {
            pod: pod.into(),
            reason: reason.into(),
        }
    }
}
