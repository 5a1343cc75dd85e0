//! [`ResourceGateway`] backed by a `kube` client.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Service};
use kube::api::{DeleteParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use super::{GatewayError, GatewayResult, ListFilter, ResourceGateway};
use crate::resources::common::FIELD_MANAGER;

/// Gateway for one Kubernetes endpoint
#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
}

impl KubeGateway {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn list<K>(&self, namespace: &str, filter: &ListFilter) -> GatewayResult<Vec<K>>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + std::fmt::Debug,
        <K as Resource>::DynamicType: Default,
    {
        let list = self
            .api::<K>(namespace)
            .list(&filter.to_list_params())
            .await?;
        Ok(list.items)
    }

    /// Server-side apply of a complete object
    async fn apply<K>(&self, obj: &K) -> GatewayResult<()>
    where
        K: Resource<Scope = NamespaceResourceScope>
            + Clone
            + DeserializeOwned
            + Serialize
            + std::fmt::Debug,
        <K as Resource>::DynamicType: Default,
    {
        let (namespace, name) = object_key(obj)?;
        let patch_params = PatchParams::apply(FIELD_MANAGER).force();
        self.api::<K>(&namespace)
            .patch(&name, &patch_params, &Patch::Apply(obj))
            .await?;
        debug!(kind = %K::kind(&Default::default()), name = %name, "Applied");
        Ok(())
    }

    async fn merge_patch<K>(
        &self,
        namespace: &str,
        name: &str,
        patch: serde_json::Value,
    ) -> GatewayResult<()>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + std::fmt::Debug,
        <K as Resource>::DynamicType: Default,
    {
        self.api::<K>(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn delete<K>(&self, namespace: &str, name: &str) -> GatewayResult<()>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + std::fmt::Debug,
        <K as Resource>::DynamicType: Default,
    {
        self.api::<K>(namespace)
            .delete(name, &DeleteParams::default())
            .await?;
        debug!(kind = %K::kind(&Default::default()), name = %name, "Deleted");
        Ok(())
    }
}

/// Namespace and name from object metadata
fn object_key<K: Resource>(obj: &K) -> GatewayResult<(String, String)> {
    let name = obj
        .meta()
        .name
        .clone()
        .ok_or_else(|| GatewayError::InvalidObject("object has no name".to_string()))?;
    let namespace = obj
        .namespace()
        .ok_or_else(|| GatewayError::InvalidObject(format!("{} has no namespace", name)))?;
    Ok((namespace, name))
}

#[async_trait]
impl ResourceGateway for KubeGateway {
    async fn list_deployments(
        &self,
        namespace: &str,
        filter: &ListFilter,
    ) -> GatewayResult<Vec<Deployment>> {
        self.list(namespace, filter).await
    }

    async fn create_deployment(&self, deployment: &Deployment) -> GatewayResult<()> {
        let (namespace, name) = object_key(deployment)?;
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        self.api::<Deployment>(&namespace)
            .create(&params, deployment)
            .await?;
        debug!(name = %name, "Created Deployment");
        Ok(())
    }

    async fn patch_deployment_labels(
        &self,
        namespace: &str,
        name: &str,
        labels: &BTreeMap<String, String>,
    ) -> GatewayResult<()> {
        self.merge_patch::<Deployment>(namespace, name, json!({ "metadata": { "labels": labels } }))
            .await
    }

    async fn scale_deployment(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> GatewayResult<()> {
        self.merge_patch::<Deployment>(namespace, name, json!({ "spec": { "replicas": replicas } }))
            .await
    }

    async fn patch_pod_template_annotation(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
        value: &str,
    ) -> GatewayResult<()> {
        let patch = json!({
            "spec": { "template": { "metadata": { "annotations": { key: value } } } }
        });
        self.merge_patch::<Deployment>(namespace, name, patch).await
    }

    async fn delete_deployment(&self, namespace: &str, name: &str) -> GatewayResult<()> {
        self.delete::<Deployment>(namespace, name).await
    }

    async fn list_config_maps(
        &self,
        namespace: &str,
        filter: &ListFilter,
    ) -> GatewayResult<Vec<ConfigMap>> {
        self.list(namespace, filter).await
    }

    async fn apply_config_map(&self, config_map: &ConfigMap) -> GatewayResult<()> {
        self.apply(config_map).await
    }

    async fn patch_config_map_data(
        &self,
        namespace: &str,
        name: &str,
        data: &BTreeMap<String, String>,
    ) -> GatewayResult<()> {
        self.merge_patch::<ConfigMap>(namespace, name, json!({ "data": data }))
            .await
    }

    async fn delete_config_map(&self, namespace: &str, name: &str) -> GatewayResult<()> {
        self.delete::<ConfigMap>(namespace, name).await
    }

    async fn list_services(
        &self,
        namespace: &str,
        filter: &ListFilter,
    ) -> GatewayResult<Vec<Service>> {
        self.list(namespace, filter).await
    }

    async fn apply_service(&self, service: &Service) -> GatewayResult<()> {
        self.apply(service).await
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> GatewayResult<()> {
        self.delete::<Service>(namespace, name).await
    }

    async fn apply_pvc(&self, pvc: &PersistentVolumeClaim) -> GatewayResult<()> {
        self.apply(pvc).await
    }

    async fn delete_pvc(&self, namespace: &str, name: &str) -> GatewayResult<()> {
        self.delete::<PersistentVolumeClaim>(namespace, name).await
    }
}
