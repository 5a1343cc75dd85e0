//! Rebuild logical clusters from the physical objects in a namespace.
//!
//! One Deployment list drives the result. Every cluster found there gets one
//! ConfigMap list and one Service list; a failure in either only leaves the
//! matching fields of that view empty. Nothing is cached.

mod correlation;
mod info;

pub use correlation::{Correlation, DeploymentPair, correlate, group};
pub use info::{cluster_info, parse_cpu, parse_memory_bytes};

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::gateway::{ListFilter, ResourceGateway};
use crate::model::{ClusterFilter, ClusterList, ClusterStatus, LogicalClusterView};
use crate::naming::{ClusterName, LB_SERVICE_SUFFIX, ManagerRole};
use crate::resources::common::LABEL_APP;
use crate::resources::configmap::{FLINK_CONF_FILE, parse_flink_conf};

/// List the logical clusters matching `filter`
pub async fn list(gateway: &dyn ResourceGateway, filter: &ClusterFilter) -> Result<ClusterList> {
    let namespace = filter.namespace.as_str();
    let deployments = gateway
        .list_deployments(namespace, &ListFilter::labels(filter.label_selector()))
        .await
        .map_err(Error::DeploymentList)?;
    debug!(namespace = %namespace, count = deployments.len(), "Listed Deployments");

    let mut items = Vec::new();
    for (name, pair) in group(&deployments) {
        let mut view = seed_view(&name, namespace, &pair);
        attach_flink_configuration(gateway, &mut view).await;
        attach_load_balancers(gateway, &mut view).await;
        items.push(view);
    }

    Ok(ClusterList::new(items))
}

fn seed_view(name: &str, namespace: &str, pair: &DeploymentPair<'_>) -> LogicalClusterView {
    let first = pair.first;
    let mut view = LogicalClusterView {
        name: name.to_string(),
        namespace: first
            .and_then(|d| d.metadata.namespace.clone())
            .unwrap_or_else(|| namespace.to_string()),
        labels: first
            .and_then(|d| d.metadata.labels.clone())
            .unwrap_or_default(),
        ..Default::default()
    };

    view.status = ClusterStatus {
        job_manager: pair.job_manager.map(deployment_status),
        task_manager: pair.task_manager.map(deployment_status),
        endpoints: BTreeMap::new(),
    };

    for (role, deployment) in [
        (ManagerRole::JobManager, pair.job_manager),
        (ManagerRole::TaskManager, pair.task_manager),
    ] {
        if let Some(annotations) = deployment.and_then(|d| d.metadata.annotations.clone()) {
            view.annotations
                .insert(role.label_value().to_string(), annotations);
        }
    }

    view.info = pair.task_manager.map(cluster_info);
    view
}

fn deployment_status(deployment: &Deployment) -> k8s_openapi::api::apps::v1::DeploymentStatus {
    deployment.status.clone().unwrap_or_default()
}

async fn attach_flink_configuration(gateway: &dyn ResourceGateway, view: &mut LogicalClusterView) {
    let filter = ListFilter::labels(format!("{}={}", LABEL_APP, view.name));
    match gateway.list_config_maps(&view.namespace, &filter).await {
        Ok(config_maps) => {
            if let Some(conf) = first_flink_conf(&config_maps) {
                view.flink_configuration = parse_flink_conf(conf);
            }
        }
        Err(e) => {
            warn!(name = %view.name, error = %e, "Failed to list ConfigMaps");
        }
    }
}

fn first_flink_conf(config_maps: &[ConfigMap]) -> Option<&str> {
    config_maps
        .iter()
        .find_map(|cm| cm.data.as_ref()?.get(FLINK_CONF_FILE))
        .map(String::as_str)
}

async fn attach_load_balancers(gateway: &dyn ResourceGateway, view: &mut LogicalClusterView) {
    // The view name may not be a valid ClusterName (e.g. hand-made Deployments)
    let lb_name = match ClusterName::new(view.name.as_str()) {
        Ok(name) => name.lb_service(),
        Err(_) => format!("{}{}", view.name, LB_SERVICE_SUFFIX),
    };
    match gateway
        .list_services(&view.namespace, &ListFilter::name(&lb_name))
        .await
    {
        Ok(services) => {
            for (key, endpoint) in load_balancer_endpoints(&services) {
                view.status.endpoints.insert(key.clone(), endpoint.clone());
                view.load_balancer.insert(key, endpoint);
            }
        }
        Err(e) => {
            warn!(name = %view.name, error = %e, "Failed to list LoadBalancer services");
        }
    }
}

/// `loadbalance-<k>` to `ip:port` for every ingress of every service
pub fn load_balancer_endpoints(services: &[Service]) -> Vec<(String, String)> {
    let mut endpoints = Vec::new();
    for service in services {
        let Some(port) = service
            .spec
            .as_ref()
            .and_then(|s| s.ports.as_ref())
            .and_then(|p| p.first())
            .map(|p| p.port)
        else {
            continue;
        };
        let ingresses = service
            .status
            .as_ref()
            .and_then(|s| s.load_balancer.as_ref())
            .and_then(|lb| lb.ingress.as_ref());
        for ingress in ingresses.into_iter().flatten() {
            let Some(host) = ingress.ip.as_ref().or(ingress.hostname.as_ref()) else {
                continue;
            };
            endpoints.push((
                format!("loadbalance-{}", endpoints.len()),
                format!("{}:{}", host, port),
            ));
        }
    }
    endpoints
}
