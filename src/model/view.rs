//! Read models returned by list and create.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::DeploymentStatus;
use serde::Serialize;

use crate::naming::PhysicalResourceRef;

/// Resources confirmed by a create
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateOutcome {
    pub cluster: String,
    pub namespace: String,
    pub resources: Vec<PhysicalResourceRef>,
}

/// Result of a list call
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterList {
    pub total: usize,
    pub items: Vec<LogicalClusterView>,
}

impl ClusterList {
    pub fn new(items: Vec<LogicalClusterView>) -> Self {
        Self {
            total: items.len(),
            items,
        }
    }
}

/// One logical cluster rebuilt from its physical objects.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalClusterView {
    pub name: String,
    pub namespace: String,
    /// Labels of the first Deployment seen for the cluster.
    pub labels: BTreeMap<String, String>,
    pub status: ClusterStatus,
    /// Deployment annotations keyed by role.
    pub annotations: BTreeMap<String, BTreeMap<String, String>>,
    /// Derived from the TaskManager Deployment.
    pub info: Option<ClusterInfo>,
    /// Live `flink-conf.yaml` contents.
    pub flink_configuration: BTreeMap<String, String>,
    /// `loadbalance-<k>` to `ip:port`.
    pub load_balancer: BTreeMap<String, String>,
}

/// Per-role status. An absent Deployment leaves its field empty.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    pub job_manager: Option<DeploymentStatus>,
    pub task_manager: Option<DeploymentStatus>,
    #[serde(flatten)]
    pub endpoints: BTreeMap<String, String>,
}

/// Summary of the TaskManager Deployment.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInfo {
    /// RFC 3339 creation time.
    pub create_time: Option<String>,
    pub images: Vec<String>,
    pub replicas: i32,
    pub ready_replicas: i32,
    /// CPU limit per TaskManager, in cores.
    pub cpu_cores: Option<f64>,
    /// Memory limit per TaskManager, in GB.
    pub memory_gb: Option<f64>,
}
