//! Per-object access to one Kubernetes endpoint.
//!
//! The lifecycle code only talks to [`ResourceGateway`]. [`KubeGateway`] is
//! the production implementation; tests substitute an in-memory one.

mod kube_gateway;

pub use kube_gateway::KubeGateway;

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Service};
use kube::api::ListParams;
use thiserror::Error;

/// Failure of a single gateway call
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Object does not exist (HTTP 404)
    #[error("not found: {0}")]
    NotFound(String),

    /// Object already exists (HTTP 409)
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Any other API status
    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    /// Transport or client error
    #[error("Kubernetes client error: {0}")]
    Kube(#[source] kube::Error),

    /// Object is missing a name or namespace
    #[error("invalid object: {0}")]
    InvalidObject(String),
}

impl GatewayError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, GatewayError::AlreadyExists(_))
    }
}

impl From<kube::Error> for GatewayError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(e) if e.code == 404 => GatewayError::NotFound(e.message),
            kube::Error::Api(e) if e.code == 409 => GatewayError::AlreadyExists(e.message),
            kube::Error::Api(e) => GatewayError::Api {
                code: e.code,
                message: e.message,
            },
            other => GatewayError::Kube(other),
        }
    }
}

/// Result type alias for gateway calls
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Label and field selectors for a list call
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub label_selector: Option<String>,
    pub field_selector: Option<String>,
}

impl ListFilter {
    pub fn labels(selector: impl Into<String>) -> Self {
        let selector = selector.into();
        Self {
            label_selector: (!selector.is_empty()).then_some(selector),
            field_selector: None,
        }
    }

    pub fn fields(selector: impl Into<String>) -> Self {
        let selector = selector.into();
        Self {
            label_selector: None,
            field_selector: (!selector.is_empty()).then_some(selector),
        }
    }

    /// Field selector matching a single object name
    pub fn name(name: &str) -> Self {
        Self::fields(format!("metadata.name={}", name))
    }

    pub fn to_list_params(&self) -> ListParams {
        let mut params = ListParams::default();
        if let Some(labels) = &self.label_selector {
            params = params.labels(labels);
        }
        if let Some(fields) = &self.field_selector {
            params = params.fields(fields);
        }
        params
    }
}

/// Per-object CRUD against one Kubernetes endpoint.
///
/// Create and apply calls take the namespace from the object metadata.
/// Apply is server-side apply with force.
#[async_trait]
pub trait ResourceGateway: Send + Sync {
    async fn list_deployments(
        &self,
        namespace: &str,
        filter: &ListFilter,
    ) -> GatewayResult<Vec<Deployment>>;

    async fn create_deployment(&self, deployment: &Deployment) -> GatewayResult<()>;

    /// Merge `labels` into the Deployment metadata
    async fn patch_deployment_labels(
        &self,
        namespace: &str,
        name: &str,
        labels: &BTreeMap<String, String>,
    ) -> GatewayResult<()>;

    async fn scale_deployment(&self, namespace: &str, name: &str, replicas: i32)
    -> GatewayResult<()>;

    /// Set a pod template annotation to trigger a rolling restart
    async fn patch_pod_template_annotation(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
        value: &str,
    ) -> GatewayResult<()>;

    async fn delete_deployment(&self, namespace: &str, name: &str) -> GatewayResult<()>;

    async fn list_config_maps(
        &self,
        namespace: &str,
        filter: &ListFilter,
    ) -> GatewayResult<Vec<ConfigMap>>;

    async fn apply_config_map(&self, config_map: &ConfigMap) -> GatewayResult<()>;

    /// Merge `data` keys into an existing ConfigMap
    async fn patch_config_map_data(
        &self,
        namespace: &str,
        name: &str,
        data: &BTreeMap<String, String>,
    ) -> GatewayResult<()>;

    async fn delete_config_map(&self, namespace: &str, name: &str) -> GatewayResult<()>;

    async fn list_services(
        &self,
        namespace: &str,
        filter: &ListFilter,
    ) -> GatewayResult<Vec<Service>>;

    async fn apply_service(&self, service: &Service) -> GatewayResult<()>;

    async fn delete_service(&self, namespace: &str, name: &str) -> GatewayResult<()>;

    async fn apply_pvc(&self, pvc: &PersistentVolumeClaim) -> GatewayResult<()>;

    async fn delete_pvc(&self, namespace: &str, name: &str) -> GatewayResult<()>;
}
