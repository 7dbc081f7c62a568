//! Test runner pod
//!
//! Handles the "run tests" end of a workflow:
//! - Replace any runner pod left from a previous run
//! - Create the pod with image references on its command line
//! - Wait for it to start and forward its log to stdout
//! - Report the pod's final phase

use crate::conditions::{ignore_if_doesnt_exist, ErrorKind, WaitOptions};
use crate::config::DevConfig;
use crate::context::{Context, ContextError};
use crate::error::Error;
use crate::image::ImageKind;
use crate::wait::{pod_phase, terminated_exit_code};
use k8s_openapi::api::core::v1::{Container, Pod, PodSpec};
use kube::api::ObjectMeta;
use std::time::Duration;
use tracing::{info, warn};

/// Name shared by the runner pod, its container and its ServiceAccount
pub const TEST_RUNNER_NAME: &str = "test-runner";

/// Poll timing for the stale runner pod to disappear
pub fn deletion_wait() -> WaitOptions {
    WaitOptions::new(Duration::from_secs(10), Duration::from_millis(500))
}

/// Poll timing for the runner pod to start; it may not be visible right away
pub fn running_wait() -> WaitOptions {
    WaitOptions::new(Duration::from_secs(50), Duration::from_secs(5)).tolerate(ErrorKind::NotFound)
}

/// Poll timing for the runner's final status once its log has closed
pub fn finish_wait() -> WaitOptions {
    WaitOptions::new(Duration::from_secs(30), Duration::from_secs(1))
}

/// Command line handed to the runner binary inside the image
pub fn runner_command(config: &DevConfig, test: &str) -> Vec<String> {
    vec![
        "./runner".to_string(),
        "--operatorImage".to_string(),
        config.image(ImageKind::Operator),
        "--preHookImage".to_string(),
        config.image(ImageKind::Prehook),
        "--testImage".to_string(),
        config.image(ImageKind::E2e),
        format!("--test={test}"),
        format!("--namespace={}", config.namespace),
    ]
}

/// Pod that runs `test` against the configured namespace
pub fn pod_spec(config: &DevConfig, test: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(TEST_RUNNER_NAME.to_string()),
            namespace: Some(config.namespace.clone()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            restart_policy: Some("Never".to_string()),
            service_account_name: Some(TEST_RUNNER_NAME.to_string()),
            containers: vec![Container {
                name: TEST_RUNNER_NAME.to_string(),
                image: Some(config.image(ImageKind::TestRunner)),
                image_pull_policy: Some("Always".to_string()),
                command: Some(runner_command(config, test)),
                ..Default::default()
            }],
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Delete the runner pod from a previous run, if any
pub async fn delete_stale(ctx: &Context) -> Result<(), ContextError> {
    if ignore_if_doesnt_exist(|| ctx.delete::<Pod>(TEST_RUNNER_NAME))
        .await?
        .is_none()
    {
        info!("No previous test runner pod");
    }
    Ok(())
}

pub async fn await_deletion(ctx: &Context) -> Result<(), ContextError> {
    ctx.wait_pod_absent(TEST_RUNNER_NAME, &deletion_wait()).await
}

pub async fn create(ctx: &Context, test: &str) -> Result<Pod, ContextError> {
    info!(test = %test, "Creating test runner pod");
    ctx.create(&pod_spec(&ctx.config, test)).await
}

pub async fn await_running(ctx: &Context) -> Result<Pod, ContextError> {
    info!("Waiting for pod to be running");
    ctx.wait_pod_started(TEST_RUNNER_NAME, &running_wait()).await
}

/// Forward the runner's log to stdout until the container exits
pub async fn stream_logs(ctx: &Context) -> Result<usize, ContextError> {
    ctx.follow_logs(TEST_RUNNER_NAME, |line| println!("{line}"))
        .await
}

/// Wait for the runner pod to finish and fail unless its tests passed
///
/// The log stream closes when the container exits, possibly before the
/// pod phase is updated, so the pod is polled until its phase or its
/// container status shows the result.
pub async fn check_result(ctx: &Context) -> Result<(), Error> {
    let pod = ctx.wait_pod_finished(TEST_RUNNER_NAME, &finish_wait()).await?;
    verdict(&pod)
}

fn verdict(pod: &Pod) -> Result<(), Error> {
    match (pod_phase(pod), terminated_exit_code(pod)) {
        (Some("Failed"), _) => Err(Error::tests_failed(TEST_RUNNER_NAME, "ended in phase Failed")),
        (Some("Succeeded"), _) | (_, Some(0)) => {
            info!("Test runner succeeded");
            Ok(())
        }
        (_, Some(code)) => Err(Error::tests_failed(
            TEST_RUNNER_NAME,
            format!("exited with code {code}"),
        )),
        (phase, None) => {
            warn!(phase = ?phase, "Test runner has not reported a result");
            Err(Error::tests_failed(TEST_RUNNER_NAME, "did not report a result"))
        }
    }
}
