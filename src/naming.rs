//! Naming scheme for the physical objects of a logical Flink cluster.
//!
//! A logical cluster owns six objects whose names are derived from the
//! cluster name by a fixed suffix. Nothing about the mapping is stored, so the
//! lister and the orchestrator both recompute it from the name alone.

use std::fmt;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maximum length of a Kubernetes object name (DNS-1123 label)
pub const MAX_K8S_NAME_LEN: usize = 63;

pub const JOB_MANAGER_SUFFIX: &str = "-jobmanager";
pub const TASK_MANAGER_SUFFIX: &str = "-taskmanager";
pub const CONFIG_MAP_SUFFIX: &str = "-configmap";
pub const SERVICE_SUFFIX: &str = "-jobmanager-service";
pub const LB_SERVICE_SUFFIX: &str = "-jobmanager-lb-service";
pub const PVC_SUFFIX: &str = "-pvc";

/// Longest logical name whose derived names still fit in a Kubernetes name
pub const MAX_CLUSTER_NAME_LEN: usize = MAX_K8S_NAME_LEN - LB_SERVICE_SUFFIX.len();

static DNS_LABEL_RE: LazyLock<Option<regex::Regex>> =
    LazyLock::new(|| regex::Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").ok());

/// The six kinds of physical objects backing a logical cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    #[serde(rename = "jobmanager-deployment")]
    JobManagerDeployment,
    #[serde(rename = "taskmanager-deployment")]
    TaskManagerDeployment,
    #[serde(rename = "configmap")]
    ConfigMap,
    #[serde(rename = "service")]
    Service,
    #[serde(rename = "lb-service")]
    LoadBalancerService,
    #[serde(rename = "pvc")]
    Pvc,
}

impl ResourceKind {
    /// All kinds, in delete order
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::JobManagerDeployment,
        ResourceKind::TaskManagerDeployment,
        ResourceKind::ConfigMap,
        ResourceKind::Service,
        ResourceKind::LoadBalancerService,
        ResourceKind::Pvc,
    ];

    /// Name suffix appended to the cluster name
    pub fn suffix(self) -> &'static str {
        match self {
            ResourceKind::JobManagerDeployment => JOB_MANAGER_SUFFIX,
            ResourceKind::TaskManagerDeployment => TASK_MANAGER_SUFFIX,
            ResourceKind::ConfigMap => CONFIG_MAP_SUFFIX,
            ResourceKind::Service => SERVICE_SUFFIX,
            ResourceKind::LoadBalancerService => LB_SERVICE_SUFFIX,
            ResourceKind::Pvc => PVC_SUFFIX,
        }
    }

    /// Kubernetes kind of the object
    pub fn api_kind(self) -> &'static str {
        match self {
            ResourceKind::JobManagerDeployment | ResourceKind::TaskManagerDeployment => {
                "Deployment"
            }
            ResourceKind::ConfigMap => "ConfigMap",
            ResourceKind::Service | ResourceKind::LoadBalancerService => "Service",
            ResourceKind::Pvc => "PersistentVolumeClaim",
        }
    }

    /// Whether a failure of this kind aborts a create
    pub fn is_load_bearing(self) -> bool {
        matches!(
            self,
            ResourceKind::JobManagerDeployment
                | ResourceKind::TaskManagerDeployment
                | ResourceKind::Pvc
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::JobManagerDeployment => "jobmanager-deployment",
            ResourceKind::TaskManagerDeployment => "taskmanager-deployment",
            ResourceKind::ConfigMap => "configmap",
            ResourceKind::Service => "service",
            ResourceKind::LoadBalancerService => "lb-service",
            ResourceKind::Pvc => "pvc",
        };
        f.write_str(s)
    }
}

/// The two Flink processes, each backed by one Deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagerRole {
    JobManager,
    TaskManager,
}

impl ManagerRole {
    pub const ALL: [ManagerRole; 2] = [ManagerRole::JobManager, ManagerRole::TaskManager];

    /// Value of the `component` label on the Deployment and its pods
    pub fn label_value(self) -> &'static str {
        match self {
            ManagerRole::JobManager => "jobmanager",
            ManagerRole::TaskManager => "taskmanager",
        }
    }

    pub fn from_label_value(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.label_value() == value)
    }

    pub fn kind(self) -> ResourceKind {
        match self {
            ManagerRole::JobManager => ResourceKind::JobManagerDeployment,
            ManagerRole::TaskManager => ResourceKind::TaskManagerDeployment,
        }
    }

    pub fn suffix(self) -> &'static str {
        self.kind().suffix()
    }

    /// Role whose suffix `deployment_name` ends in
    pub fn from_suffix(deployment_name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|r| deployment_name.ends_with(r.suffix()))
    }
}

impl fmt::Display for ManagerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label_value())
    }
}

/// Validated logical cluster name.
///
/// Guaranteed to be a DNS-1123 label short enough that every derived name is
/// one too.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ClusterName(String);

impl ClusterName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::Validation("cluster name is required".to_string()));
        }
        if name.len() > MAX_CLUSTER_NAME_LEN {
            return Err(Error::Validation(format!(
                "cluster name '{}' exceeds maximum length of {} characters",
                name, MAX_CLUSTER_NAME_LEN
            )));
        }
        if !is_dns_label(&name) {
            return Err(Error::Validation(format!(
                "cluster name '{}' must consist of lowercase alphanumeric characters or '-', \
                 and must start and end with an alphanumeric character",
                name
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Physical name of the object of `kind`
    pub fn resource_name(&self, kind: ResourceKind) -> String {
        format!("{}{}", self.0, kind.suffix())
    }

    pub fn job_manager(&self) -> String {
        self.resource_name(ResourceKind::JobManagerDeployment)
    }

    pub fn task_manager(&self) -> String {
        self.resource_name(ResourceKind::TaskManagerDeployment)
    }

    pub fn config_map(&self) -> String {
        self.resource_name(ResourceKind::ConfigMap)
    }

    pub fn service(&self) -> String {
        self.resource_name(ResourceKind::Service)
    }

    pub fn lb_service(&self) -> String {
        self.resource_name(ResourceKind::LoadBalancerService)
    }

    pub fn pvc(&self) -> String {
        self.resource_name(ResourceKind::Pvc)
    }

    /// Refs for every kind in `namespace`
    pub fn resource_refs(&self, namespace: &str) -> Vec<PhysicalResourceRef> {
        ResourceKind::ALL
            .iter()
            .map(|kind| PhysicalResourceRef::new(*kind, namespace, self))
            .collect()
    }
}

impl fmt::Display for ClusterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ClusterName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ClusterName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for ClusterName {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        ClusterName::new(s).map_err(serde::de::Error::custom)
    }
}

/// Check a string against the DNS-1123 label pattern (length excluded)
pub fn is_dns_label(value: &str) -> bool {
    DNS_LABEL_RE.as_ref().is_some_and(|re| re.is_match(value))
}

/// Address of one physical object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PhysicalResourceRef {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
}

impl PhysicalResourceRef {
    pub fn new(kind: ResourceKind, namespace: &str, cluster: &ClusterName) -> Self {
        Self {
            kind,
            namespace: namespace.to_string(),
            name: cluster.resource_name(kind),
        }
    }
}

impl fmt::Display for PhysicalResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind.api_kind(), self.namespace, self.name)
    }
}
