//! e2e - run one operator end-to-end test inside a cluster

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use tracing::{error, info};

use operator_e2e::{kubeconfig, Context, DevConfig, DockerBuilder, Error, RunOptions, Workflow};

/// Build, deploy and run an operator e2e test in the current cluster
#[derive(Parser, Debug)]
#[command(name = "e2e", version, about, long_about = None)]
struct Cli {
    /// Name of the test to run
    #[arg(long)]
    test: String,

    /// Do not install the operator; assumes one is installed already
    #[arg(long, action = ArgAction::Set, default_value_t = false)]
    skip_operator_install: bool,

    /// Development config file
    ///
    /// Defaults to $E2E_DEV_CONFIG, then ~/.community-operator-dev/config.json.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    operator_e2e::init_logging();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    let kubeconfig = kubeconfig::path_from_env()?;

    let config_path = match cli.config {
        Some(path) => path,
        None => DevConfig::default_path()?,
    };
    let config = DevConfig::load(&config_path)?;
    info!(
        config = %config_path.display(),
        namespace = %config.namespace,
        repo = %config.repo_url,
        "Loaded dev config"
    );

    let ctx = Context::new(config).await?;
    let builder = DockerBuilder::new();
    let options = RunOptions {
        test: cli.test,
        skip_operator_install: cli.skip_operator_install,
    };

    let summary = Workflow::new(&ctx, &builder, options, kubeconfig)
        .run()
        .await?;
    info!(stages = summary.completed.len(), "All stages completed");
    Ok(())
}
