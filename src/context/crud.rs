use super::{ApiFailure, Context, ContextError};
use kube::api::{Api, DeleteParams, ListParams, ObjectList, PostParams};
use kube::core::{ClusterResourceScope, NamespaceResourceScope};
use tracing::{debug, info};

fn resource_name<K: kube::Resource>(resource: &K) -> Result<String, ContextError> {
    resource
        .meta()
        .name
        .clone()
        .ok_or_else(|| ContextError::InvalidResource("resource must have a name".to_string()))
}

fn kind_of<K>() -> String
where
    K: kube::Resource,
    <K as kube::Resource>::DynamicType: Default,
{
    K::kind(&Default::default()).to_string()
}

impl Context {
    /// Create a resource in the run namespace
    ///
    /// Overrides any namespace set in the resource metadata. Fails with an
    /// `AlreadyExists` kind if the name is taken; wrap the call in
    /// [`ignore_if_already_exists`](crate::conditions::ignore_if_already_exists)
    /// when that is expected.
    pub async fn create<K>(&self, resource: &K) -> Result<K, ContextError>
    where
        K: kube::Resource<Scope = NamespaceResourceScope>
            + Clone
            + serde::de::DeserializeOwned
            + serde::Serialize
            + std::fmt::Debug,
        <K as kube::Resource>::DynamicType: Default,
    {
        self.create_in(self.namespace(), resource).await
    }

    /// Create a resource in an explicit namespace
    pub async fn create_in<K>(&self, namespace: &str, resource: &K) -> Result<K, ContextError>
    where
        K: kube::Resource<Scope = NamespaceResourceScope>
            + Clone
            + serde::de::DeserializeOwned
            + serde::Serialize
            + std::fmt::Debug,
        <K as kube::Resource>::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);

        let mut resource = resource.clone();
        resource.meta_mut().namespace = Some(namespace.to_string());
        let name = resource_name(&resource)?;
        let kind = kind_of::<K>();

        let created = api
            .create(&PostParams::default(), &resource)
            .await
            .map_err(|e| ContextError::CreateError(ApiFailure::new(&e, &kind, &name)))?;

        info!(namespace = %namespace, kind = %kind, name = %name, "Created resource");
        Ok(created)
    }

    /// Create a cluster-scoped resource (Namespace, CRD, ClusterRoleBinding)
    pub async fn create_cluster<K>(&self, resource: &K) -> Result<K, ContextError>
    where
        K: kube::Resource<Scope = ClusterResourceScope>
            + Clone
            + serde::de::DeserializeOwned
            + serde::Serialize
            + std::fmt::Debug,
        <K as kube::Resource>::DynamicType: Default,
    {
        let api: Api<K> = Api::all(self.client.clone());
        let name = resource_name(resource)?;
        let kind = kind_of::<K>();

        let created = api
            .create(&PostParams::default(), resource)
            .await
            .map_err(|e| ContextError::CreateError(ApiFailure::new(&e, &kind, &name)))?;

        info!(kind = %kind, name = %name, "Created cluster-scoped resource");
        Ok(created)
    }

    /// Get a resource from the run namespace
    pub async fn get<K>(&self, name: &str) -> Result<K, ContextError>
    where
        K: kube::Resource<Scope = NamespaceResourceScope>
            + Clone
            + serde::de::DeserializeOwned
            + std::fmt::Debug,
        <K as kube::Resource>::DynamicType: Default,
    {
        self.get_in(self.namespace(), name).await
    }

    /// Get a resource from an explicit namespace
    pub async fn get_in<K>(&self, namespace: &str, name: &str) -> Result<K, ContextError>
    where
        K: kube::Resource<Scope = NamespaceResourceScope>
            + Clone
            + serde::de::DeserializeOwned
            + std::fmt::Debug,
        <K as kube::Resource>::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let kind = kind_of::<K>();

        api.get(name)
            .await
            .map_err(|e| ContextError::GetError(ApiFailure::new(&e, &kind, name)))
    }

    /// Delete a resource from the run namespace
    ///
    /// Returns once the API server accepted the deletion; the object may
    /// linger while it terminates.
    pub async fn delete<K>(&self, name: &str) -> Result<(), ContextError>
    where
        K: kube::Resource<Scope = NamespaceResourceScope>
            + Clone
            + serde::de::DeserializeOwned
            + std::fmt::Debug,
        <K as kube::Resource>::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), self.namespace());
        let kind = kind_of::<K>();

        api.delete(name, &DeleteParams::default())
            .await
            .map_err(|e| ContextError::DeleteError(ApiFailure::new(&e, &kind, name)))?;

        info!(namespace = %self.namespace(), kind = %kind, name = %name, "Deleted resource");
        Ok(())
    }

    /// List resources in the run namespace whose name is exactly `name`
    ///
    /// Unlike `get`, an absent object yields an empty list rather than an
    /// error.
    pub async fn list_named<K>(&self, name: &str) -> Result<ObjectList<K>, ContextError>
    where
        K: kube::Resource<Scope = NamespaceResourceScope>
            + Clone
            + serde::de::DeserializeOwned
            + std::fmt::Debug,
        <K as kube::Resource>::DynamicType: Default,
    {
        self.list_with_fields(&format!("metadata.name=={name}"), name)
            .await
    }

    /// List resources in the run namespace matching a field selector
    pub(crate) async fn list_with_fields<K>(
        &self,
        fields: &str,
        context_name: &str,
    ) -> Result<ObjectList<K>, ContextError>
    where
        K: kube::Resource<Scope = NamespaceResourceScope>
            + Clone
            + serde::de::DeserializeOwned
            + std::fmt::Debug,
        <K as kube::Resource>::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), self.namespace());
        let kind = kind_of::<K>();

        let list = api
            .list(&ListParams::default().fields(fields))
            .await
            .map_err(|e| ContextError::ListError(ApiFailure::new(&e, &kind, context_name)))?;

        debug!(
            namespace = %self.namespace(),
            kind = %kind,
            fields = %fields,
            count = list.items.len(),
            "Listed resources"
        );
        Ok(list)
    }
}
