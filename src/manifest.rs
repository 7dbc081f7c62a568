//! Typed manifest loading
//!
//! Reads a single-document YAML file into a `k8s-openapi` type.

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Manifest loading errors
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Manifest not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Load a manifest file as `K`
pub fn load<K: DeserializeOwned>(path: impl AsRef<Path>) -> Result<K, ManifestError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ManifestError::NotFound(path.to_path_buf()));
    }

    let contents = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(path = %path.display(), "Loaded manifest");
    serde_yaml::from_str(&contents).map_err(|source| ManifestError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
