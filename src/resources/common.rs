//! Common resource generation utilities.
//!
//! Labels, selectors and quantity helpers shared by every generated object.
//! The `app` and `owner` labels are the only correlation keys the lister
//! relies on, so every generator goes through [`standard_labels`].

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ResourceRequirements;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::model::ResourceSpec;
use crate::naming::{ClusterName, ManagerRole};

/// Field manager for server-side apply
pub const FIELD_MANAGER: &str = "flink-k8s-manager";

pub const LABEL_APP: &str = "app";
pub const LABEL_OWNER: &str = "owner";
pub const LABEL_COMPONENT: &str = "component";

/// Annotation carrying the requested job upgrade mode
pub const ANNOTATION_UPGRADE_MODE: &str = "flink.apache.org/upgrade-mode";

/// Pod template annotation used to trigger a rolling restart
pub const ANNOTATION_RESTARTED_AT: &str = "kubectl.kubernetes.io/restartedAt";

/// JobManager RPC port
pub const JOB_MANAGER_RPC_PORT: i32 = 6123;
/// JobManager blob server port
pub const BLOB_SERVER_PORT: i32 = 6124;
/// Web UI and REST port
pub const WEB_UI_PORT: i32 = 8081;
/// TaskManager RPC port
pub const TASK_MANAGER_RPC_PORT: i32 = 6122;
/// Queryable state proxy port
pub const QUERY_STATE_PORT: i32 = 6125;

/// Labels on every object of a cluster: `app=<cluster>` and `owner=<owner>`
pub fn standard_labels(cluster: &ClusterName, owner: Option<&str>) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_APP.to_string(), cluster.to_string());
    if let Some(owner) = owner.filter(|o| !o.is_empty()) {
        labels.insert(LABEL_OWNER.to_string(), owner.to_string());
    }
    labels
}

/// Standard labels plus the `component` role label
pub fn role_labels(
    cluster: &ClusterName,
    owner: Option<&str>,
    role: ManagerRole,
) -> BTreeMap<String, String> {
    let mut labels = standard_labels(cluster, owner);
    labels.insert(LABEL_COMPONENT.to_string(), role.label_value().to_string());
    labels
}

/// Selector labels for the pods of one role
pub fn pod_selector_labels(cluster: &ClusterName, role: ManagerRole) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_APP.to_string(), cluster.to_string());
    labels.insert(LABEL_COMPONENT.to_string(), role.label_value().to_string());
    labels
}

/// Selector for the high-availability ConfigMaps Flink creates for itself
pub fn ha_config_map_selector(cluster: &ClusterName) -> String {
    format!(
        "{}={},configmap-type=high-availability,type=flink-native-kubernetes",
        LABEL_APP, cluster
    )
}

/// Namespaced metadata with the given labels
pub fn object_meta(
    name: String,
    namespace: &str,
    labels: BTreeMap<String, String>,
) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: Some(namespace.to_string()),
        labels: Some(labels),
        ..Default::default()
    }
}

/// Build resource requirements from the request.
///
/// `request_cpu` overrides the CPU request; limits always take the requested
/// values. Missing quantities are left out.
pub fn resource_requirements(
    resource: &ResourceSpec,
    request_cpu: Option<&str>,
) -> Option<ResourceRequirements> {
    let mut limits = BTreeMap::new();
    if let Some(cpu) = &resource.cpu {
        limits.insert("cpu".to_string(), Quantity(cpu.clone()));
    }
    if let Some(memory) = &resource.memory {
        limits.insert("memory".to_string(), Quantity(memory.clone()));
    }
    if limits.is_empty() {
        return None;
    }

    let mut requests = limits.clone();
    if let Some(cpu) = request_cpu {
        requests.insert("cpu".to_string(), Quantity(cpu.to_string()));
    }

    Some(ResourceRequirements {
        limits: Some(limits),
        requests: Some(requests),
        ..Default::default()
    })
}

/// `None` for an empty map, so optional fields stay unset in the payload
pub fn non_empty(map: &BTreeMap<String, String>) -> Option<BTreeMap<String, String>> {
    if map.is_empty() {
        None
    } else {
        Some(map.clone())
    }
}
