//! Kubernetes resource generators for logical Flink clusters.
//!
//! [`synthesize`] validates a create request and builds the full object graph:
//! - JobManager and TaskManager Deployments
//! - ConfigMap with `flink-conf.yaml` and the logging config
//! - ClusterIP Service and optional LoadBalancer Service
//! - PersistentVolumeClaim for the JobManager upload directory

pub mod common;
pub mod configmap;
pub mod deployment;
pub mod pvc;
pub mod services;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Service};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::CreateClusterRequest;
use crate::naming::{ClusterName, PhysicalResourceRef, ResourceKind};
use crate::validation::{UpgradeMode, validate_create_request, validate_job};

/// How the LoadBalancer service picks its node port
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodePortPolicy {
    /// Random port in 30000-32767, used as both port and nodePort
    #[default]
    Random,
    /// Web UI port, node port assigned by the platform
    Platform,
}

/// Settings that apply to every synthesized cluster
#[derive(Clone, Debug, Default)]
pub struct SynthesisOptions {
    pub node_port: NodePortPolicy,
}

/// Validated inputs shared by the generators
#[derive(Debug)]
pub struct ClusterContext<'a> {
    pub name: ClusterName,
    pub request: &'a CreateClusterRequest,
    pub upgrade_mode: Option<UpgradeMode>,
}

impl<'a> ClusterContext<'a> {
    pub fn new(request: &'a CreateClusterRequest) -> Result<Self> {
        let name = validate_create_request(request)?;
        let upgrade_mode = match &request.job {
            Some(job) => validate_job(job)?,
            None => None,
        };
        Ok(Self {
            name,
            request,
            upgrade_mode,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.request.namespace
    }

    pub fn owner(&self) -> Option<&str> {
        self.request.owner.as_deref().filter(|o| !o.is_empty())
    }
}

/// Desired state of one logical cluster
#[derive(Clone, Debug)]
pub struct ResourceSpecSet {
    pub name: ClusterName,
    pub namespace: String,
    pub pvc: PersistentVolumeClaim,
    pub job_manager: Deployment,
    pub task_manager: Deployment,
    pub config_map: ConfigMap,
    pub service: Service,
    pub load_balancer: Option<Service>,
}

impl ResourceSpecSet {
    /// Refs of the objects in this set, omitting an absent LoadBalancer
    pub fn resource_refs(&self) -> Vec<PhysicalResourceRef> {
        self.name
            .resource_refs(&self.namespace)
            .into_iter()
            .filter(|r| r.kind != ResourceKind::LoadBalancerService || self.load_balancer.is_some())
            .collect()
    }
}

/// Build every object for a create request
pub fn synthesize(
    request: &CreateClusterRequest,
    options: &SynthesisOptions,
) -> Result<ResourceSpecSet> {
    let ctx = ClusterContext::new(request)?;

    Ok(ResourceSpecSet {
        pvc: pvc::generate_pvc(&ctx),
        job_manager: deployment::generate_job_manager_deployment(&ctx),
        task_manager: deployment::generate_task_manager_deployment(&ctx),
        config_map: configmap::generate_config_map(&ctx),
        service: services::generate_service(&ctx),
        load_balancer: request
            .load_balancer
            .as_ref()
            .map(|lb| services::generate_load_balancer_service(&ctx, lb, options.node_port)),
        namespace: request.namespace.clone(),
        name: ctx.name,
    })
}
