//! Kubeconfig mirroring
//!
//! The test runner talks to the API server from inside the cluster, where
//! the address in a developer's kubeconfig (usually a forwarded localhost
//! port) is unreachable. The local kubeconfig is copied into a ConfigMap
//! with its server rewritten to the `kubernetes` Service's cluster IP.

use crate::conditions::ignore_if_already_exists;
use crate::context::Context;
use crate::error::Error;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use kube::api::ObjectMeta;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable pointing at the local kubeconfig
pub const KUBECONFIG_ENV_VAR: &str = "KUBECONFIG";

/// Name of the ConfigMap holding the rewritten kubeconfig
pub const CONFIG_MAP_NAME: &str = "kube-config";

/// Namespace of the ConfigMap and of the `kubernetes` Service
pub const CONFIG_MAP_NAMESPACE: &str = "default";

/// ConfigMap key holding the kubeconfig
pub const CONFIG_MAP_KEY: &str = "kubeconfig";

/// Kubeconfig errors
#[derive(Debug, thiserror::Error)]
pub enum KubeconfigError {
    #[error("{0} is not set; point it at the kubeconfig of the test cluster")]
    MissingEnv(&'static str),

    #[error("Failed to read kubeconfig {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid kubeconfig YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Kubeconfig has no clusters[0].cluster entry")]
    MissingCluster,

    #[error("Service default/kubernetes has no cluster IP")]
    MissingClusterIp,
}

/// Resolve the kubeconfig path from `KUBECONFIG`
pub fn path_from_env() -> Result<PathBuf, KubeconfigError> {
    resolve_path(std::env::var_os(KUBECONFIG_ENV_VAR))
}

/// First entry of a `KUBECONFIG`-style path list
pub fn resolve_path(value: Option<OsString>) -> Result<PathBuf, KubeconfigError> {
    value
        .as_deref()
        .and_then(|v| std::env::split_paths(v).find(|p| !p.as_os_str().is_empty()))
        .ok_or(KubeconfigError::MissingEnv(KUBECONFIG_ENV_VAR))
}

/// Point the first cluster of `contents` at `https://{cluster_ip}`
pub fn rewrite_server(contents: &str, cluster_ip: &str) -> Result<String, KubeconfigError> {
    let mut config: Value = serde_yaml::from_str(contents)?;

    let cluster = config
        .get_mut("clusters")
        .and_then(|c| c.get_mut(0))
        .and_then(|c| c.get_mut("cluster"))
        .and_then(Value::as_mapping_mut)
        .ok_or(KubeconfigError::MissingCluster)?;

    cluster.insert(
        Value::from("server"),
        Value::from(format!("https://{cluster_ip}")),
    );

    Ok(serde_yaml::to_string(&config)?)
}

/// ConfigMap carrying a kubeconfig
pub fn config_map(kubeconfig: String) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(CONFIG_MAP_NAME.to_string()),
            namespace: Some(CONFIG_MAP_NAMESPACE.to_string()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(CONFIG_MAP_KEY.to_string(), kubeconfig)])),
        ..Default::default()
    }
}

/// Publish the kubeconfig at `path` as the `kube-config` ConfigMap
///
/// An existing ConfigMap is left untouched.
pub async fn mirror(ctx: &Context, path: &Path) -> Result<(), Error> {
    info!("Creating kube-config ConfigMap");

    let service: Service = ctx.get_in(CONFIG_MAP_NAMESPACE, "kubernetes").await?;
    let cluster_ip = service
        .spec
        .and_then(|s| s.cluster_ip)
        .filter(|ip| !ip.is_empty())
        .ok_or(KubeconfigError::MissingClusterIp)?;

    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| KubeconfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    let rewritten = rewrite_server(&contents, &cluster_ip)?;

    let cm = config_map(rewritten);
    ignore_if_already_exists(|| ctx.create_in(CONFIG_MAP_NAMESPACE, &cm)).await?;
    Ok(())
}
