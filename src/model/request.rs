//! Request payloads for the cluster entry points.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{EnvVar, Probe, VolumeMount};
use serde::{Deserialize, Deserializer, Serialize};

/// Default namespace for created clusters
pub const DEFAULT_NAMESPACE: &str = "flink";

/// Default namespace searched by list
pub const DEFAULT_LIST_NAMESPACE: &str = "default";

/// Default Flink image
pub const DEFAULT_IMAGE: &str = "flink:1.12.7";

/// Default number of TaskManager replicas
pub const DEFAULT_TASK_MANAGERS: i32 = 5;

/// Default JobManager PVC size in GiB
pub const DEFAULT_PVC_SIZE_GIB: i32 = 10;

/// Request to create a logical Flink cluster.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClusterRequest {
    /// Logical cluster name; must be a DNS-1123 label.
    #[serde(default)]
    pub name: String,

    /// Target namespace (default: flink).
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Value of the `owner` label on every object.
    #[serde(default)]
    pub owner: Option<String>,

    /// Flink image for both managers (default: flink:1.12.7).
    #[serde(default = "default_image")]
    pub image: String,

    /// Environment variables for both Flink containers.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Expose the web UI through a LoadBalancer service.
    #[serde(default)]
    pub load_balancer: Option<LoadBalancerSpec>,

    #[serde(default)]
    pub job_manager: JobManagerSpec,

    #[serde(default)]
    pub task_manager: TaskManagerSpec,

    /// Overrides for `flink-conf.yaml`. Scalars are stored as strings.
    #[serde(default, deserialize_with = "scalar_map")]
    pub flink_configuration: BTreeMap<String, String>,

    /// Optional job submitted to the session cluster.
    #[serde(default)]
    pub job: Option<JobSpec>,

    /// Require memory quantities in Mi or Gi.
    #[serde(default)]
    pub strict_validation: bool,
}

impl Default for CreateClusterRequest {
    fn default() -> Self {
        Self {
            name: String::new(),
            namespace: default_namespace(),
            owner: None,
            image: default_image(),
            env: BTreeMap::new(),
            load_balancer: None,
            job_manager: JobManagerSpec::default(),
            task_manager: TaskManagerSpec::default(),
            flink_configuration: BTreeMap::new(),
            job: None,
            strict_validation: false,
        }
    }
}

impl CreateClusterRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// CPU and memory for one container. Requests equal limits unless noted.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
    /// CPU quantity, e.g. `2` or `500m`.
    #[serde(default)]
    pub cpu: Option<String>,

    /// Memory quantity, e.g. `4Gi`.
    #[serde(default)]
    pub memory: Option<String>,
}

impl ResourceSpec {
    pub fn new(cpu: impl Into<String>, memory: impl Into<String>) -> Self {
        Self {
            cpu: Some(cpu.into()),
            memory: Some(memory.into()),
        }
    }
}

/// JobManager settings.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobManagerSpec {
    #[serde(default)]
    pub resource: ResourceSpec,

    #[serde(default)]
    pub node_selector: BTreeMap<String, String>,

    /// Size of the upload/target volume in GiB (default: 10).
    #[serde(default = "default_pvc_size")]
    pub pvc_size: i32,

    /// Storage class of the PVC; cluster default when unset.
    #[serde(default)]
    pub storage_class: Option<String>,

    /// Extra containers in the JobManager pod.
    #[serde(default)]
    pub sidecars: Vec<SideCar>,
}

impl Default for JobManagerSpec {
    fn default() -> Self {
        Self {
            resource: ResourceSpec::default(),
            node_selector: BTreeMap::new(),
            pvc_size: default_pvc_size(),
            storage_class: None,
            sidecars: Vec::new(),
        }
    }
}

/// TaskManager settings.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskManagerSpec {
    #[serde(default)]
    pub resource: ResourceSpec,

    #[serde(default)]
    pub node_selector: BTreeMap<String, String>,

    /// Number of TaskManager pods (default: 5).
    #[serde(default = "default_task_managers")]
    pub replicas: i32,
}

impl Default for TaskManagerSpec {
    fn default() -> Self {
        Self {
            resource: ResourceSpec::default(),
            node_selector: BTreeMap::new(),
            replicas: default_task_managers(),
        }
    }
}

/// Metadata for the LoadBalancer service.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerSpec {
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Container added next to the JobManager.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SideCar {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub image: String,

    #[serde(default)]
    pub command: Vec<String>,

    #[serde(default)]
    pub env: Vec<EnvVar>,

    #[serde(default)]
    pub volume_mounts: Vec<VolumeMount>,

    #[serde(default)]
    pub liveness_probe: Option<Probe>,
}

/// Job submitted to the cluster.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    /// JAR location; `local://`, `http://` or `https://`.
    #[serde(default)]
    pub jar_uri: Option<String>,

    #[serde(default)]
    pub parallelism: Option<i32>,

    /// One of `stateless`, `savepoint`, `last-state`.
    #[serde(default)]
    pub upgrade_mode: Option<String>,
}

/// Partial update of a running cluster.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyClusterRequest {
    /// Labels merged onto both Deployments.
    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,

    /// Replaces the whole `flink-conf.yaml` document.
    #[serde(default, deserialize_with = "optional_scalar_map")]
    pub flink_configuration: Option<BTreeMap<String, String>>,
}

impl ApplyClusterRequest {
    pub fn is_empty(&self) -> bool {
        self.labels.is_none() && self.flink_configuration.is_none()
    }
}

/// Request to delete a logical cluster.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteClusterRequest {
    #[serde(default = "default_namespace")]
    pub namespace: String,

    pub cluster_name: String,
}

impl DeleteClusterRequest {
    pub fn new(namespace: impl Into<String>, cluster_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            cluster_name: cluster_name.into(),
        }
    }
}

/// Filter for listing logical clusters.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterFilter {
    #[serde(default = "default_list_namespace")]
    pub namespace: String,

    #[serde(default)]
    pub owner: Option<String>,

    #[serde(default)]
    pub name: Option<String>,
}

impl Default for ClusterFilter {
    fn default() -> Self {
        Self {
            namespace: default_list_namespace(),
            owner: None,
            name: None,
        }
    }
}

impl ClusterFilter {
    pub fn in_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Label selector for the Deployment list. Empty means no selector.
    pub fn label_selector(&self) -> String {
        let mut parts = Vec::new();
        if let Some(owner) = self.owner.as_deref().filter(|o| !o.is_empty()) {
            parts.push(format!("{}={}", crate::resources::common::LABEL_OWNER, owner));
        }
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            parts.push(format!("{}={}", crate::resources::common::LABEL_APP, name));
        }
        parts.join(",")
    }
}

/// New TaskManager replica count.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleRequest {
    pub replicas: i32,
}

/// Which Deployments a restart touches.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RestartTarget {
    #[default]
    All,
    JobManager,
    TaskManager,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartRequest {
    #[serde(default)]
    pub target: RestartTarget,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_list_namespace() -> String {
    DEFAULT_LIST_NAMESPACE.to_string()
}

fn default_image() -> String {
    DEFAULT_IMAGE.to_string()
}

fn default_task_managers() -> i32 {
    DEFAULT_TASK_MANAGERS
}

fn default_pvc_size() -> i32 {
    DEFAULT_PVC_SIZE_GIB
}

/// Accept a flat map of scalars, storing each value in its string form
fn scalar_map<'de, D>(d: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_json::Value>::deserialize(d)?;
    raw.into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                other => {
                    return Err(serde::de::Error::custom(format!(
                        "flink configuration value for '{}' must be a scalar, got {}",
                        key, other
                    )));
                }
            };
            Ok((key, value))
        })
        .collect()
}

fn optional_scalar_map<'de, D>(d: D) -> Result<Option<BTreeMap<String, String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "scalar_map")] BTreeMap<String, String>);

    Option::<Wrapper>::deserialize(d).map(|w| w.map(|Wrapper(m)| m))
}
