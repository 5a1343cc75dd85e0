//! Create, apply and delete across the objects of a logical cluster.
//!
//! Nothing is kept between calls. Create is ordered so the load-bearing
//! objects go first and abort on failure; auxiliary objects are attempted
//! regardless and their failures are reported together. Delete walks every
//! object in a fixed order and treats NotFound as success, so it can be
//! repeated until it returns `Ok`.

use std::future::Future;

use tracing::{debug, info, warn};

use crate::error::{Error, PartialFailure, ResourceFailure, Result};
use crate::gateway::{GatewayResult, ListFilter, ResourceGateway};
use crate::model::{ApplyClusterRequest, CreateOutcome, RestartTarget};
use crate::naming::{ClusterName, ManagerRole, PhysicalResourceRef, ResourceKind};
use crate::resources::ResourceSpecSet;
use crate::resources::common::{ANNOTATION_RESTARTED_AT, ha_config_map_selector};
use crate::resources::configmap::config_map_data;
use crate::validation::{validate_apply_request, validate_replicas};

/// Create every object of `specs`.
///
/// The PVC and both Deployments are load-bearing: the first failure among them
/// is returned at once and nothing is rolled back. ConfigMap and Service
/// failures are collected into [`Error::PartialFailure`].
pub async fn create(gateway: &dyn ResourceGateway, specs: &ResourceSpecSet) -> Result<CreateOutcome> {
    let namespace = specs.namespace.as_str();
    let name = &specs.name;
    info!(name = %name, namespace = %namespace, "Creating Flink cluster");

    let mut outcome = CreateOutcome {
        cluster: name.to_string(),
        namespace: namespace.to_string(),
        resources: Vec::new(),
    };

    // Load-bearing
    gateway
        .apply_pvc(&specs.pvc)
        .await
        .map_err(|e| Error::transport(ResourceKind::Pvc, e))?;
    confirm(&mut outcome, name, ResourceKind::Pvc);

    create_deployment(gateway, &specs.job_manager, ResourceKind::JobManagerDeployment).await?;
    confirm(&mut outcome, name, ResourceKind::JobManagerDeployment);

    create_deployment(gateway, &specs.task_manager, ResourceKind::TaskManagerDeployment).await?;
    confirm(&mut outcome, name, ResourceKind::TaskManagerDeployment);

    // Auxiliary
    let mut failures = Vec::new();
    let config_map = gateway.apply_config_map(&specs.config_map).await;
    record(&mut outcome, &mut failures, name, ResourceKind::ConfigMap, config_map);

    let service = gateway.apply_service(&specs.service).await;
    record(&mut outcome, &mut failures, name, ResourceKind::Service, service);

    if let Some(lb) = &specs.load_balancer {
        let lb = gateway.apply_service(lb).await;
        record(&mut outcome, &mut failures, name, ResourceKind::LoadBalancerService, lb);
    }

    if !failures.is_empty() {
        return Err(Error::PartialFailure(Box::new(PartialFailure { outcome, failures })));
    }

    info!(name = %name, resources = outcome.resources.len(), "Created Flink cluster");
    Ok(outcome)
}

async fn create_deployment(
    gateway: &dyn ResourceGateway,
    deployment: &k8s_openapi::api::apps::v1::Deployment,
    kind: ResourceKind,
) -> Result<()> {
    match gateway.create_deployment(deployment).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_already_exists() => {
            debug!(kind = %kind, "Deployment already exists");
            Ok(())
        }
        Err(e) => Err(Error::transport(kind, e)),
    }
}

fn confirm(outcome: &mut CreateOutcome, name: &ClusterName, kind: ResourceKind) {
    debug!(name = %name, kind = %kind, "Submitted");
    outcome
        .resources
        .push(PhysicalResourceRef::new(kind, &outcome.namespace, name));
}

fn record(
    outcome: &mut CreateOutcome,
    failures: &mut Vec<ResourceFailure>,
    name: &ClusterName,
    kind: ResourceKind,
    result: GatewayResult<()>,
) {
    match result {
        Ok(()) => confirm(outcome, name, kind),
        Err(e) => {
            warn!(name = %name, kind = %kind, error = %e, "Auxiliary resource failed");
            failures.push(ResourceFailure {
                kind,
                message: e.to_string(),
            });
        }
    }
}

/// Apply the mutable parts of a running cluster.
///
/// Labels are merged onto both Deployments. A Flink configuration replaces
/// the whole `flink-conf.yaml` document. Absent fields are left untouched.
pub async fn apply(
    gateway: &dyn ResourceGateway,
    namespace: &str,
    name: &ClusterName,
    update: &ApplyClusterRequest,
) -> Result<()> {
    validate_apply_request(update)?;
    if update.is_empty() {
        debug!(name = %name, "Nothing to apply");
        return Ok(());
    }

    if let Some(labels) = &update.labels {
        for role in ManagerRole::ALL {
            let kind = role.kind();
            gateway
                .patch_deployment_labels(namespace, &name.resource_name(kind), labels)
                .await
                .map_err(|e| Error::transport(kind, e))?;
        }
        info!(name = %name, labels = labels.len(), "Applied labels");
    }

    if let Some(conf) = &update.flink_configuration {
        gateway
            .patch_config_map_data(namespace, &name.config_map(), &config_map_data(conf))
            .await
            .map_err(|e| Error::transport(ResourceKind::ConfigMap, e))?;
        info!(name = %name, keys = conf.len(), "Replaced Flink configuration");
    }

    Ok(())
}

/// Delete every object of a cluster, including Flink's HA ConfigMaps.
///
/// Missing objects count as deleted. Any other failure stops the sequence.
pub async fn delete(gateway: &dyn ResourceGateway, namespace: &str, name: &ClusterName) -> Result<()> {
    info!(name = %name, namespace = %namespace, "Deleting Flink cluster");

    ignore_not_found(
        ResourceKind::JobManagerDeployment,
        gateway.delete_deployment(namespace, &name.job_manager()),
    )
    .await?;
    ignore_not_found(
        ResourceKind::TaskManagerDeployment,
        gateway.delete_deployment(namespace, &name.task_manager()),
    )
    .await?;

    ignore_not_found(
        ResourceKind::ConfigMap,
        gateway.delete_config_map(namespace, &name.config_map()),
    )
    .await?;
    let ha_maps = gateway
        .list_config_maps(namespace, &ListFilter::labels(ha_config_map_selector(name)))
        .await
        .map_err(|e| Error::transport(ResourceKind::ConfigMap, e))?;
    for cm in ha_maps {
        if let Some(cm_name) = cm.metadata.name {
            debug!(name = %name, config_map = %cm_name, "Deleting HA ConfigMap");
            ignore_not_found(
                ResourceKind::ConfigMap,
                gateway.delete_config_map(namespace, &cm_name),
            )
            .await?;
        }
    }

    ignore_not_found(
        ResourceKind::Service,
        gateway.delete_service(namespace, &name.service()),
    )
    .await?;
    ignore_not_found(
        ResourceKind::LoadBalancerService,
        gateway.delete_service(namespace, &name.lb_service()),
    )
    .await?;
    ignore_not_found(ResourceKind::Pvc, gateway.delete_pvc(namespace, &name.pvc())).await?;

    info!(name = %name, "Deleted Flink cluster");
    Ok(())
}

async fn ignore_not_found(
    kind: ResourceKind,
    call: impl Future<Output = GatewayResult<()>>,
) -> Result<()> {
    match call.await {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => {
            debug!(kind = %kind, "Already absent");
            Ok(())
        }
        Err(e) => Err(Error::transport(kind, e)),
    }
}

/// Set the TaskManager replica count
pub async fn scale_task_managers(
    gateway: &dyn ResourceGateway,
    namespace: &str,
    name: &ClusterName,
    replicas: i32,
) -> Result<()> {
    validate_replicas(replicas)?;
    gateway
        .scale_deployment(namespace, &name.task_manager(), replicas)
        .await
        .map_err(|e| Error::transport(ResourceKind::TaskManagerDeployment, e))?;
    info!(name = %name, replicas, "Scaled TaskManagers");
    Ok(())
}

/// Rolling restart of the selected Deployments
pub async fn restart(
    gateway: &dyn ResourceGateway,
    namespace: &str,
    name: &ClusterName,
    target: RestartTarget,
) -> Result<()> {
    let roles: &[ManagerRole] = match target {
        RestartTarget::All => &[ManagerRole::TaskManager, ManagerRole::JobManager],
        RestartTarget::JobManager => &[ManagerRole::JobManager],
        RestartTarget::TaskManager => &[ManagerRole::TaskManager],
    };
    let restarted_at = jiff::Timestamp::now().to_string();

    for role in roles {
        let kind = role.kind();
        gateway
            .patch_pod_template_annotation(
                namespace,
                &name.resource_name(kind),
                ANNOTATION_RESTARTED_AT,
                &restarted_at,
            )
            .await
            .map_err(|e| Error::transport(kind, e))?;
        info!(name = %name, role = %role, "Restarted");
    }
    Ok(())
}
