//! Test-runner RBAC
//!
//! The runner needs its own ServiceAccount plus the roles that let it create
//! and inspect test resources. The manifests live under
//! `{deploy_dir}/testrunner/` and are created as-is; objects left over from
//! an earlier run are kept.

use crate::conditions::ignore_if_already_exists;
use crate::context::{Context, ContextError};
use crate::manifest::{self, ManifestError};
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, Role, RoleBinding};
use std::path::Path;
use tracing::info;

/// Subdirectory of the deploy directory holding the runner's RBAC manifests
pub const TESTRUNNER_DIR: &str = "testrunner";

/// Bundle containing the test runner's `ServiceAccount`, Role and bindings
#[derive(Debug, Clone)]
pub struct RBACBundle {
    /// The `ServiceAccount` the runner pod runs as
    pub service_account: ServiceAccount,
    /// Namespaced permissions
    pub role: Role,
    /// Binds the Role to the `ServiceAccount`
    pub role_binding: RoleBinding,
    /// Grants cluster-wide permissions to the `ServiceAccount`
    pub cluster_role_binding: ClusterRoleBinding,
}

impl RBACBundle {
    /// Load the bundle from `{deploy_dir}/testrunner/`
    pub fn load(deploy_dir: &Path) -> Result<Self, ManifestError> {
        let dir = deploy_dir.join(TESTRUNNER_DIR);
        Ok(Self {
            service_account: manifest::load(dir.join("service_account.yaml"))?,
            role: manifest::load(dir.join("role.yaml"))?,
            role_binding: manifest::load(dir.join("role_binding.yaml"))?,
            cluster_role_binding: manifest::load(dir.join("cluster_role_binding.yaml"))?,
        })
    }

    /// Create every object, skipping those that already exist
    pub async fn apply(&self, ctx: &Context) -> Result<(), ContextError> {
        info!("Creating Role");
        ignore_if_already_exists(|| ctx.create(&self.role)).await?;

        info!("Creating Role Binding");
        ignore_if_already_exists(|| ctx.create(&self.role_binding)).await?;

        info!("Creating Cluster Role Binding");
        ignore_if_already_exists(|| ctx.create_cluster(&self.cluster_role_binding)).await?;

        info!("Creating ServiceAccount");
        ignore_if_already_exists(|| ctx.create(&self.service_account)).await?;

        Ok(())
    }
}
