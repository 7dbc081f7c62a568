//! Container images used by the test run
//!
//! Every image is built from `{dockerfile_dir}/Dockerfile.<kind>` with the
//! repository root as build context, tagged `{repo_url}/{name}` and pushed
//! so the cluster can pull it.

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use crate::config::DevConfig;

/// The images a run needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Operator,
    TestRunner,
    E2e,
    Prehook,
}

impl ImageKind {
    /// Images the test runner pod references, in build order
    pub const TEST_IMAGES: [ImageKind; 3] = [ImageKind::TestRunner, ImageKind::E2e, ImageKind::Prehook];

    /// Repository name under the registry
    pub fn name(self) -> &'static str {
        match self {
            ImageKind::Operator => "mongodb-kubernetes-operator",
            ImageKind::TestRunner => "test-runner",
            ImageKind::E2e => "e2e",
            ImageKind::Prehook => "prehook",
        }
    }

    /// Suffix of the Dockerfile the image is built from
    pub fn dockerfile_suffix(self) -> &'static str {
        match self {
            ImageKind::Operator => "operator",
            ImageKind::TestRunner => "testrunner",
            ImageKind::E2e => "e2e",
            ImageKind::Prehook => "prehook",
        }
    }

    pub fn reference(self, repo_url: &str) -> String {
        format!("{}/{}", repo_url, self.name())
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error type for image operations
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Dockerfile not found: {0}")]
    DockerfileNotFound(PathBuf),

    #[error("Failed to build {image}: {stderr}")]
    BuildFailed { image: String, stderr: String },

    #[error("Failed to push {image}: {stderr}")]
    PushFailed { image: String, stderr: String },

    #[error("Command execution failed: {0}")]
    CommandFailed(String),
}

/// Everything needed to build one image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSpec {
    pub kind: ImageKind,
    /// Full reference the image is tagged and pushed as
    pub tag: String,
    pub dockerfile: PathBuf,
    pub context: PathBuf,
}

impl ImageSpec {
    pub fn for_kind(kind: ImageKind, config: &DevConfig) -> Self {
        Self {
            kind,
            tag: config.image(kind),
            dockerfile: config
                .dockerfile_dir
                .join(format!("Dockerfile.{}", kind.dockerfile_suffix())),
            context: PathBuf::from("."),
        }
    }
}

/// Builds images and pushes them to a registry
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    /// Build and tag the image
    async fn build(&self, spec: &ImageSpec) -> Result<(), ImageError>;

    /// Push a tagged image to its registry
    async fn push(&self, tag: &str) -> Result<(), ImageError>;

    /// Builder name for display
    fn name(&self) -> &'static str;
}

/// Build then push a single image
#[instrument(skip(builder, spec), fields(image = %spec.tag, builder = builder.name()))]
pub async fn build_and_push(builder: &dyn ImageBuilder, spec: &ImageSpec) -> Result<(), ImageError> {
    info!("Building image {}", spec.tag);
    builder.build(spec).await?;
    info!("Pushing image {}", spec.tag);
    builder.push(&spec.tag).await
}

/// Build and push each kind in order, stopping at the first failure
pub async fn build_all(
    builder: &dyn ImageBuilder,
    config: &DevConfig,
    kinds: &[ImageKind],
) -> Result<(), ImageError> {
    for kind in kinds {
        build_and_push(builder, &ImageSpec::for_kind(*kind, config)).await?;
    }
    Ok(())
}

/// Builds with the local `docker` CLI
pub struct DockerBuilder;

impl DockerBuilder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DockerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageBuilder for DockerBuilder {
    async fn build(&self, spec: &ImageSpec) -> Result<(), ImageError> {
        if !spec.dockerfile.exists() {
            return Err(ImageError::DockerfileNotFound(spec.dockerfile.clone()));
        }

        let dockerfile = spec.dockerfile.to_string_lossy();
        let context = spec.context.to_string_lossy();
        debug!(dockerfile = %dockerfile, context = %context, "docker build");

        let output = Command::new("docker")
            .args(["build", "-t", &spec.tag, "-f", &dockerfile, &context])
            .output()
            .await
            .map_err(|e| ImageError::CommandFailed(e.to_string()))?;

        if !output.status.success() {
            return Err(ImageError::BuildFailed {
                image: spec.tag.clone(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        Ok(())
    }

    async fn push(&self, tag: &str) -> Result<(), ImageError> {
        let output = Command::new("docker")
            .args(["push", tag])
            .output()
            .await
            .map_err(|e| ImageError::CommandFailed(e.to_string()))?;

        if !output.status.success() {
            return Err(ImageError::PushFailed {
                image: tag.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "docker"
    }
}
