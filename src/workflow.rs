//! The e2e run, stage by stage
//!
//! A run is a fixed sequence of [`Stage`]s. [`plan`] decides which stages
//! apply (operator installation is optional) and [`Workflow::run`] executes
//! them in order, stopping at the first failure.

use crate::context::Context;
use crate::error::Error;
use crate::image::{build_all, ImageBuilder, ImageKind};
use crate::rbac::RBACBundle;
use crate::{kubeconfig, operator, runner};
use std::fmt;
use std::path::PathBuf;
use tracing::{info, instrument};

/// One blocking step of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    MirrorKubeconfig,
    BuildOperator,
    DeployOperator,
    BuildTestImages,
    ProvisionRbac,
    DeleteStaleRunner,
    AwaitRunnerDeletion,
    CreateRunner,
    AwaitRunnerRunning,
    StreamLogs,
}

impl Stage {
    pub fn description(self) -> &'static str {
        match self {
            Stage::MirrorKubeconfig => "Mirror kubeconfig into the cluster",
            Stage::BuildOperator => "Build and push operator image",
            Stage::DeployOperator => "Deploy operator",
            Stage::BuildTestImages => "Build and push test images",
            Stage::ProvisionRbac => "Provision test runner RBAC",
            Stage::DeleteStaleRunner => "Delete previous test runner pod",
            Stage::AwaitRunnerDeletion => "Wait for previous test runner pod to go away",
            Stage::CreateRunner => "Create test runner pod",
            Stage::AwaitRunnerRunning => "Wait for test runner pod to run",
            Stage::StreamLogs => "Stream test runner logs",
        }
    }

    /// Images built by this stage
    pub fn images(self) -> &'static [ImageKind] {
        match self {
            Stage::BuildOperator => &[ImageKind::Operator],
            Stage::BuildTestImages => &ImageKind::TEST_IMAGES,
            _ => &[],
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// What to run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Test name passed to the runner
    pub test: String,
    /// Assume an operator is already installed
    pub skip_operator_install: bool,
}

/// Stages a run with `options` goes through, in order
pub fn plan(options: &RunOptions) -> Vec<Stage> {
    let mut stages = vec![Stage::MirrorKubeconfig];
    if !options.skip_operator_install {
        stages.extend([Stage::BuildOperator, Stage::DeployOperator]);
    }
    stages.extend([
        Stage::BuildTestImages,
        Stage::ProvisionRbac,
        Stage::DeleteStaleRunner,
        Stage::AwaitRunnerDeletion,
        Stage::CreateRunner,
        Stage::AwaitRunnerRunning,
        Stage::StreamLogs,
    ]);
    stages
}

/// Result of a completed run
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Stages that finished, in order
    pub completed: Vec<Stage>,
    /// Log lines forwarded from the runner
    pub log_lines: usize,
}

/// A single e2e run against one cluster
pub struct Workflow<'a> {
    ctx: &'a Context,
    builder: &'a dyn ImageBuilder,
    options: RunOptions,
    kubeconfig: PathBuf,
}

impl<'a> Workflow<'a> {
    pub fn new(
        ctx: &'a Context,
        builder: &'a dyn ImageBuilder,
        options: RunOptions,
        kubeconfig: PathBuf,
    ) -> Self {
        Self {
            ctx,
            builder,
            options,
            kubeconfig,
        }
    }

    /// Run every planned stage, then check how the runner pod ended
    #[instrument(skip(self), fields(test = %self.options.test, namespace = %self.ctx.namespace()))]
    pub async fn run(&self) -> Result<RunSummary, Error> {
        let stages = plan(&self.options);
        let mut summary = RunSummary::default();

        for (i, stage) in stages.iter().enumerate() {
            info!("[{}/{}] {}", i + 1, stages.len(), stage);
            if let Some(lines) = self.execute(*stage).await? {
                summary.log_lines = lines;
            }
            summary.completed.push(*stage);
        }

        runner::check_result(self.ctx).await?;
        info!(lines = summary.log_lines, "Run finished");
        Ok(summary)
    }

    /// Execute one stage; log streaming reports the number of lines seen
    async fn execute(&self, stage: Stage) -> Result<Option<usize>, Error> {
        let ctx = self.ctx;
        match stage {
            Stage::MirrorKubeconfig => kubeconfig::mirror(ctx, &self.kubeconfig).await?,
            Stage::BuildOperator | Stage::BuildTestImages => {
                build_all(self.builder, &ctx.config, stage.images()).await?
            }
            Stage::DeployOperator => operator::install(ctx).await?,
            Stage::ProvisionRbac => RBACBundle::load(&ctx.config.deploy_dir)?.apply(ctx).await?,
            Stage::DeleteStaleRunner => runner::delete_stale(ctx).await?,
            Stage::AwaitRunnerDeletion => runner::await_deletion(ctx).await?,
            Stage::CreateRunner => {
                runner::create(ctx, &self.options.test).await?;
            }
            Stage::AwaitRunnerRunning => {
                runner::await_running(ctx).await?;
            }
            Stage::StreamLogs => return Ok(Some(runner::stream_logs(ctx).await?)),
        }
        Ok(None)
    }
}
