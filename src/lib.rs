//! operator-e2e - end-to-end test orchestration for a Kubernetes operator
//!
//! Builds the operator and test images, installs the operator, prepares the
//! test runner's RBAC, then launches the test runner pod and streams its
//! output. Cluster state is synchronized with [`conditions::wait`].
//!
//! # Example
//!
//! ```no_run
//! use operator_e2e::{Context, DevConfig, DockerBuilder, RunOptions, Workflow};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let kubeconfig = operator_e2e::kubeconfig::path_from_env()?;
//!     let config = DevConfig::load(DevConfig::default_path()?)?;
//!     let ctx = Context::new(config).await?;
//!
//!     let options = RunOptions {
//!         test: "replica_set".to_string(),
//!         skip_operator_install: false,
//!     };
//!     let builder = DockerBuilder::new();
//!     Workflow::new(&ctx, &builder, options, kubeconfig).run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! e2e --test replica_set
//! e2e --test replica_set_scale --skip-operator-install true
//! ```

pub mod conditions;
pub mod config;
pub mod context;
pub mod error;
pub mod image;
pub mod kubeconfig;
pub mod manifest;
pub mod operator;
pub mod rbac;
pub mod runner;
pub mod telemetry;
pub mod wait;
pub mod workflow;

// Re-export commonly used types
pub use conditions::{
    ignore_if_already_exists, ignore_if_doesnt_exist, wait as wait_for, Classify, ErrorKind,
    Outcome, WaitOptions,
};
pub use config::{ConfigError, DevConfig};
pub use context::{Context, ContextError};
pub use error::Error;
pub use image::{DockerBuilder, ImageBuilder, ImageError, ImageKind};
pub use telemetry::init_logging;
pub use wait::WaitError;
pub use workflow::{plan, RunOptions, RunSummary, Stage, Workflow};
