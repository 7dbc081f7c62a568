//! Integration tests against a real cluster
//!
//! Run with `cargo test -- --ignored` and a working `KUBECONFIG`.

use std::time::Duration;

use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::ObjectMeta;
use operator_e2e::{
    ignore_if_already_exists, ignore_if_doesnt_exist, Context, ContextError, DevConfig, ErrorKind,
    WaitOptions,
};

async fn context() -> Context {
    let config = DevConfig::new("default", "localhost:5000");
    Context::new(config).await.expect("Should connect to cluster")
}

fn config_map(name: &str) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        data: Some([("key".to_string(), "value".to_string())].into_iter().collect()),
        ..Default::default()
    }
}

#[tokio::test]
#[ignore] // Requires real cluster
async fn test_create_is_idempotent_with_ignore() {
    let ctx = context().await;
    let cm = config_map("e2e-idempotent");

    let _ = ignore_if_doesnt_exist(|| ctx.delete::<ConfigMap>("e2e-idempotent")).await;

    let first = ignore_if_already_exists(|| ctx.create(&cm))
        .await
        .expect("First create should succeed");
    assert!(first.is_some());

    let second = ignore_if_already_exists(|| ctx.create(&cm))
        .await
        .expect("Second create should be ignored");
    assert!(second.is_none());

    ctx.delete::<ConfigMap>("e2e-idempotent")
        .await
        .expect("Should delete");
}

#[tokio::test]
#[ignore] // Requires real cluster
async fn test_delete_missing_is_ignored() {
    let ctx = context().await;

    let result = ignore_if_doesnt_exist(|| ctx.delete::<ConfigMap>("e2e-never-created"))
        .await
        .expect("Missing resource should be ignored");
    assert!(result.is_none());
}

#[tokio::test]
#[ignore] // Requires real cluster
async fn test_wait_for_absent_pod_returns_immediately() {
    let ctx = context().await;
    let options = WaitOptions::new(Duration::from_secs(10), Duration::from_millis(500));

    ctx.wait_pod_absent("e2e-no-such-pod", &options)
        .await
        .expect("Absent pod should satisfy the wait");
}

#[tokio::test]
#[ignore] // Requires real cluster
async fn test_wait_for_missing_pod_times_out() {
    let ctx = context().await;
    let options = WaitOptions::new(Duration::from_secs(2), Duration::from_millis(500))
        .tolerate(ErrorKind::NotFound);

    let err = ctx
        .wait_pod_started("e2e-no-such-pod", &options)
        .await
        .unwrap_err();

    match err {
        ContextError::WaitTimeout(e) => {
            assert_eq!(e.resource, "pod/e2e-no-such-pod");
            assert!(e.attempts >= 2);
        }
        other => panic!("expected WaitTimeout, got {other}"),
    }
}

#[tokio::test]
#[ignore] // Requires real cluster
async fn test_get_missing_pod_is_not_found() {
    use operator_e2e::Classify;
    use k8s_openapi::api::core::v1::Pod;

    let ctx = context().await;
    let err = ctx.get::<Pod>("e2e-no-such-pod").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("'e2e-no-such-pod' not found"));
}

#[tokio::test]
#[ignore] // Requires real cluster
async fn test_mirror_kubeconfig_is_idempotent() {
    use operator_e2e::kubeconfig::{self, CONFIG_MAP_KEY, CONFIG_MAP_NAME, CONFIG_MAP_NAMESPACE};

    let ctx = context().await;
    let path = kubeconfig::path_from_env().expect("KUBECONFIG should be set");

    kubeconfig::mirror(&ctx, &path)
        .await
        .expect("First mirror should succeed");
    kubeconfig::mirror(&ctx, &path)
        .await
        .expect("Second mirror should be ignored");

    let cm: ConfigMap = ctx
        .get_in(CONFIG_MAP_NAMESPACE, CONFIG_MAP_NAME)
        .await
        .expect("ConfigMap should exist");
    let data = cm.data.expect("ConfigMap should have data");
    assert!(data[CONFIG_MAP_KEY].contains("server: https://"));
}

#[tokio::test]
#[ignore] // Requires real cluster
async fn test_runner_lifecycle() {
    use k8s_openapi::api::core::v1::Pod;
    use operator_e2e::{runner, Classify};

    let ctx = context().await;

    runner::delete_stale(&ctx).await.expect("Should delete");
    runner::delete_stale(&ctx)
        .await
        .expect("Deleting twice should be ignored");
    runner::await_deletion(&ctx)
        .await
        .expect("Stale pod should go away");

    let created = runner::create(&ctx, "smoke").await.expect("Should create");
    assert_eq!(created.metadata.name.as_deref(), Some(runner::TEST_RUNNER_NAME));

    let err = runner::create(&ctx, "smoke").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    // The image is not pushed here, so the pod stays Pending
    match runner::await_running(&ctx).await {
        Err(ContextError::WaitTimeout(e)) => {
            assert!(e.last_state.contains("phase=Pending"));
        }
        Ok(_) => {}
        Err(other) => panic!("unexpected error: {other}"),
    }

    runner::delete_stale(&ctx).await.expect("Should delete");
    runner::await_deletion(&ctx)
        .await
        .expect("Pod should be deleted");

    let err = ctx.get::<Pod>(runner::TEST_RUNNER_NAME).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
