//! Operator installation
//!
//! Creates the operator's namespace, CRD, RBAC and Deployment from the
//! manifests under the deploy directory, pointing the Deployment at the
//! image that was just pushed. Every object tolerates already existing, so
//! re-running against a cluster that has the operator is harmless.

use crate::conditions::{ignore_if_already_exists, ErrorKind, WaitOptions};
use crate::context::{Context, ContextError};
use crate::image::ImageKind;
use crate::manifest::{self, ManifestError};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, ServiceAccount};
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::ObjectMeta;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// CRD manifest path relative to the deploy directory
pub const CRD_PATH: &str = "crds/mongodb.com_mongodb_crd.yaml";

/// Poll timing for the operator Deployment to become ready
pub fn readiness_wait() -> WaitOptions {
    WaitOptions::new(Duration::from_secs(60), Duration::from_secs(2)).tolerate(ErrorKind::NotFound)
}

/// The operator's manifests, loaded and ready to create
#[derive(Debug, Clone)]
pub struct OperatorManifests {
    pub crd: CustomResourceDefinition,
    pub role: Role,
    pub role_binding: RoleBinding,
    pub service_account: ServiceAccount,
    pub deployment: Deployment,
}

impl OperatorManifests {
    pub fn load(deploy_dir: &Path) -> Result<Self, ManifestError> {
        Ok(Self {
            crd: manifest::load(deploy_dir.join(CRD_PATH))?,
            role: manifest::load(deploy_dir.join("role.yaml"))?,
            role_binding: manifest::load(deploy_dir.join("role_binding.yaml"))?,
            service_account: manifest::load(deploy_dir.join("service_account.yaml"))?,
            deployment: manifest::load(deploy_dir.join("operator.yaml"))?,
        })
    }

    /// Run the first container of the Deployment with `image`, always pulled
    pub fn set_operator_image(&mut self, image: &str) -> Result<(), ContextError> {
        let container = self
            .deployment
            .spec
            .as_mut()
            .and_then(|s| s.template.spec.as_mut())
            .and_then(|s| s.containers.first_mut())
            .ok_or_else(|| {
                ContextError::InvalidResource("operator Deployment has no containers".to_string())
            })?;

        container.image = Some(image.to_string());
        container.image_pull_policy = Some("Always".to_string());
        Ok(())
    }

    /// Name of the operator Deployment
    pub fn deployment_name(&self) -> Result<&str, ContextError> {
        self.deployment.metadata.name.as_deref().ok_or_else(|| {
            ContextError::InvalidResource("operator Deployment must have a name".to_string())
        })
    }

    /// Create every object in the run namespace and wait for the operator
    pub async fn deploy(&self, ctx: &Context) -> Result<(), ContextError> {
        let name = self.deployment_name()?;

        ensure_namespace(ctx).await?;

        info!("Creating CustomResourceDefinition");
        ignore_if_already_exists(|| ctx.create_cluster(&self.crd)).await?;

        info!("Creating operator Role");
        ignore_if_already_exists(|| ctx.create(&self.role)).await?;

        info!("Creating operator Role Binding");
        ignore_if_already_exists(|| ctx.create(&self.role_binding)).await?;

        info!("Creating operator ServiceAccount");
        ignore_if_already_exists(|| ctx.create(&self.service_account)).await?;

        info!("Creating operator Deployment");
        let created = ignore_if_already_exists(|| ctx.create(&self.deployment)).await?;
        if created.is_none() {
            warn!(
                deployment = %name,
                "Operator Deployment already exists; it keeps its current image"
            );
        }

        ctx.wait_deployment_ready(name, &readiness_wait()).await?;
        Ok(())
    }
}

/// Create the run namespace unless it is already there
async fn ensure_namespace(ctx: &Context) -> Result<(), ContextError> {
    let namespace = Namespace {
        metadata: ObjectMeta {
            name: Some(ctx.namespace().to_string()),
            ..Default::default()
        },
        ..Default::default()
    };

    if ignore_if_already_exists(|| ctx.create_cluster(&namespace))
        .await?
        .is_some()
    {
        info!(namespace = %ctx.namespace(), "Created namespace");
    }
    Ok(())
}

/// Load the operator manifests, set the freshly built image and deploy them
pub async fn install(ctx: &Context) -> Result<(), crate::error::Error> {
    let mut manifests = OperatorManifests::load(&ctx.config.deploy_dir)?;
    manifests.set_operator_image(&ctx.config.image(ImageKind::Operator))?;
    manifests.deploy(ctx).await?;
    Ok(())
}
