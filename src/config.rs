//! Development configuration
//!
//! A small JSON file tells the orchestrator which namespace to test in and
//! which registry to push images to. It is loaded once at startup and handed
//! to [`Context`](crate::context::Context); nothing reads it from global state.
//!
//! ```json
//! { "namespace": "mongodb", "repo_url": "localhost:5000" }
//! ```
//!
//! # Example
//!
//! ```
//! use operator_e2e::config::DevConfig;
//!
//! let config = DevConfig::new("mongodb", "localhost:5000/")
//!     .deploy_dir("./deploy")
//!     .dockerfile_dir("./build");
//!
//! assert_eq!(config.repo_url, "localhost:5000");
//! ```

use crate::image::ImageKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable overriding the config file location
pub const CONFIG_ENV_VAR: &str = "E2E_DEV_CONFIG";

/// Config file location relative to the home directory
const DEFAULT_CONFIG_PATH: &str = ".community-operator-dev/config.json";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Cannot locate home directory; set {CONFIG_ENV_VAR}")]
    NoHomeDir,
}

/// Settings shared by every step of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevConfig {
    /// Namespace the operator and test runner live in
    pub namespace: String,

    /// Registry prefix for every image (e.g. `localhost:5000`)
    pub repo_url: String,

    /// Directory holding the operator and test-runner manifests
    #[serde(default = "default_deploy_dir")]
    pub deploy_dir: PathBuf,

    /// Directory holding `Dockerfile.<kind>` for each image
    #[serde(default = "default_dockerfile_dir")]
    pub dockerfile_dir: PathBuf,
}

fn default_deploy_dir() -> PathBuf {
    PathBuf::from("deploy")
}

fn default_dockerfile_dir() -> PathBuf {
    PathBuf::from("build")
}

impl DevConfig {
    /// Create a config with default manifest and Dockerfile directories
    pub fn new(namespace: impl Into<String>, repo_url: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            repo_url: normalize_repo_url(&repo_url.into()),
            deploy_dir: default_deploy_dir(),
            dockerfile_dir: default_dockerfile_dir(),
        }
    }

    /// Set the manifest directory
    pub fn deploy_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.deploy_dir = path.into();
        self
    }

    /// Set the Dockerfile directory
    pub fn dockerfile_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.dockerfile_dir = path.into();
        self
    }

    /// Full image reference for `kind` in the configured registry
    pub fn image(&self, kind: ImageKind) -> String {
        kind.reference(&self.repo_url)
    }

    /// Config path from `E2E_DEV_CONFIG`, else `~/.community-operator-dev/config.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR).filter(|p| !p.is_empty()) {
            return Ok(PathBuf::from(path));
        }
        dirs_next::home_dir()
            .map(|home| home.join(DEFAULT_CONFIG_PATH))
            .ok_or(ConfigError::NoHomeDir)
    }

    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        contents.parse()
    }

    fn validate(mut self) -> Result<Self, ConfigError> {
        if self.namespace.trim().is_empty() {
            return Err(ConfigError::Invalid("namespace must not be empty".to_string()));
        }
        self.repo_url = normalize_repo_url(&self.repo_url);
        if self.repo_url.is_empty() {
            return Err(ConfigError::Invalid("repo_url must not be empty".to_string()));
        }
        Ok(self)
    }
}

impl FromStr for DevConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: DevConfig = serde_json::from_str(s)?;
        config.validate()
    }
}

fn normalize_repo_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
