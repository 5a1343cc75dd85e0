//! Test fixtures and builder patterns for cluster requests and live objects.

#![allow(dead_code)]

use std::collections::BTreeMap;

use flink_k8s_manager::model::{CreateClusterRequest, JobSpec, LoadBalancerSpec, ResourceSpec};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Builder for [`CreateClusterRequest`] fixtures.
///
/// # Example
/// ```
/// let request = CreateClusterRequestBuilder::new("demo")
///     .owner("bob")
///     .task_managers(2)
///     .build();
/// ```
#[derive(Clone, Debug)]
pub struct CreateClusterRequestBuilder {
    request: CreateClusterRequest,
}

impl CreateClusterRequestBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            request: CreateClusterRequest::new(name),
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.request.namespace = namespace.into();
        self
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.request.owner = Some(owner.into());
        self
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.request.image = image.into();
        self
    }

    pub fn task_managers(mut self, replicas: i32) -> Self {
        self.request.task_manager.replicas = replicas;
        self
    }

    pub fn task_manager_resources(mut self, cpu: &str, memory: &str) -> Self {
        self.request.task_manager.resource = ResourceSpec::new(cpu, memory);
        self
    }

    pub fn job_manager_resources(mut self, cpu: &str, memory: &str) -> Self {
        self.request.job_manager.resource = ResourceSpec::new(cpu, memory);
        self
    }

    pub fn load_balancer(mut self) -> Self {
        self.request.load_balancer = Some(LoadBalancerSpec::default());
        self
    }

    pub fn flink_conf(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request
            .flink_configuration
            .insert(key.into(), value.into());
        self
    }

    pub fn job(mut self, jar_uri: &str, upgrade_mode: Option<&str>) -> Self {
        self.request.job = Some(JobSpec {
            jar_uri: Some(jar_uri.to_string()),
            parallelism: Some(2),
            upgrade_mode: upgrade_mode.map(str::to_string),
        });
        self
    }

    pub fn build(self) -> CreateClusterRequest {
        self.request
    }
}

/// Builder for Deployments as the API server would return them
#[derive(Clone, Debug)]
pub struct DeploymentBuilder {
    name: String,
    namespace: String,
    labels: BTreeMap<String, String>,
    replicas: Option<i32>,
    ready_replicas: Option<i32>,
}

impl DeploymentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: "default".to_string(),
            labels: BTreeMap::new(),
            replicas: None,
            ready_replicas: None,
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn replicas(mut self, replicas: i32) -> Self {
        self.replicas = Some(replicas);
        self
    }

    pub fn ready_replicas(mut self, ready: i32) -> Self {
        self.ready_replicas = Some(ready);
        self
    }

    pub fn build(self) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some(self.name),
                namespace: Some(self.namespace),
                labels: (!self.labels.is_empty()).then_some(self.labels),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: self.replicas,
                ..Default::default()
            }),
            status: self.ready_replicas.map(|ready| DeploymentStatus {
                ready_replicas: Some(ready),
                ..Default::default()
            }),
        }
    }
}

/// Minimal request in the given namespace
pub fn test_request(name: &str, namespace: &str) -> CreateClusterRequest {
    CreateClusterRequestBuilder::new(name)
        .namespace(namespace)
        .build()
}
