//! Deployment generation for the two Flink processes.
//!
//! - **JobManager**: one replica, `Recreate` strategy, owns the upload PVC
//! - **TaskManager**: `replicas` pods sharing the cluster ConfigMap
//!
//! Both pods mount a hostPath log directory and the generated ConfigMap, and
//! both carry a TCP liveness probe on their RPC port.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStrategy};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, EnvVar, ExecAction, HostPathVolumeSource,
    KeyToPath, Lifecycle, LifecycleHandler, PersistentVolumeClaimVolumeSource, PodSpec,
    PodTemplateSpec, Probe, SecurityContext, TCPSocketAction, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::model::SideCar;
use crate::naming::ManagerRole;
use crate::resources::ClusterContext;
use crate::resources::common::{
    ANNOTATION_UPGRADE_MODE, BLOB_SERVER_PORT, JOB_MANAGER_RPC_PORT, QUERY_STATE_PORT,
    TASK_MANAGER_RPC_PORT, WEB_UI_PORT, non_empty, object_meta, pod_selector_labels,
    resource_requirements, role_labels,
};
use crate::resources::configmap::{FLINK_CONF_FILE, LOGBACK_FILE};

const LOG_VOLUME: &str = "flink-log";
const TARGET_VOLUME: &str = "flink-target-pvc";
const CONFIG_VOLUME: &str = "flink-config";

const LOG_MOUNT_PATH: &str = "/opt/flink/log";
const TARGET_MOUNT_PATH: &str = "/opt/flink/target";
const CONFIG_MOUNT_PATH: &str = "/opt/flink/conf";

/// CPU request of a TaskManager; the limit comes from the request
const TASK_MANAGER_CPU_REQUEST: &str = "100m";

const PROBE_INITIAL_DELAY_SECONDS: i32 = 30;
const PROBE_PERIOD_SECONDS: i32 = 60;

/// Generate the JobManager Deployment.
///
/// Always exactly one replica. The `Recreate` strategy keeps two JobManagers
/// from mounting the ReadWriteOnce PVC at the same time.
pub fn generate_job_manager_deployment(ctx: &ClusterContext<'_>) -> Deployment {
    let role = ManagerRole::JobManager;
    let spec = &ctx.request.job_manager;

    let mut metadata = object_meta(
        ctx.name.job_manager(),
        ctx.namespace(),
        role_labels(&ctx.name, ctx.owner(), role),
    );
    if let Some(mode) = ctx.upgrade_mode {
        metadata.annotations = Some(BTreeMap::from([(
            ANNOTATION_UPGRADE_MODE.to_string(),
            mode.to_string(),
        )]));
    }

    let mut containers = vec![generate_job_manager_container(ctx)];
    containers.extend(spec.sidecars.iter().map(generate_sidecar_container));

    let pod_spec = PodSpec {
        containers,
        restart_policy: Some("Always".to_string()),
        node_selector: non_empty(&spec.node_selector),
        volumes: Some(vec![
            log_volume(ctx),
            Volume {
                name: TARGET_VOLUME.to_string(),
                persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                    claim_name: ctx.name.pvc(),
                    ..Default::default()
                }),
                ..Default::default()
            },
            config_volume(ctx),
        ]),
        ..Default::default()
    };

    Deployment {
        metadata,
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            strategy: Some(DeploymentStrategy {
                type_: Some("Recreate".to_string()),
                ..Default::default()
            }),
            selector: selector(ctx, role),
            template: pod_template(ctx, role, pod_spec),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Generate the TaskManager Deployment with the requested replica count.
pub fn generate_task_manager_deployment(ctx: &ClusterContext<'_>) -> Deployment {
    let role = ManagerRole::TaskManager;
    let spec = &ctx.request.task_manager;

    let pod_spec = PodSpec {
        containers: vec![generate_task_manager_container(ctx)],
        restart_policy: Some("Always".to_string()),
        node_selector: non_empty(&spec.node_selector),
        volumes: Some(vec![log_volume(ctx), config_volume(ctx)]),
        ..Default::default()
    };

    Deployment {
        metadata: object_meta(
            ctx.name.task_manager(),
            ctx.namespace(),
            role_labels(&ctx.name, ctx.owner(), role),
        ),
        spec: Some(DeploymentSpec {
            replicas: Some(spec.replicas),
            selector: selector(ctx, role),
            template: pod_template(ctx, role, pod_spec),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn selector(ctx: &ClusterContext<'_>, role: ManagerRole) -> LabelSelector {
    LabelSelector {
        match_labels: Some(pod_selector_labels(&ctx.name, role)),
        ..Default::default()
    }
}

fn pod_template(ctx: &ClusterContext<'_>, role: ManagerRole, spec: PodSpec) -> PodTemplateSpec {
    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(pod_selector_labels(&ctx.name, role)),
            ..Default::default()
        }),
        spec: Some(spec),
    }
}

fn generate_job_manager_container(ctx: &ClusterContext<'_>) -> Container {
    Container {
        name: "jobmanager".to_string(),
        image: Some(ctx.request.image.clone()),
        args: Some(vec!["jobmanager".to_string()]),
        env: env_vars(&ctx.request.env),
        ports: Some(vec![
            container_port("rpc", JOB_MANAGER_RPC_PORT),
            container_port("webui", WEB_UI_PORT),
            container_port("blob-service", BLOB_SERVER_PORT),
        ]),
        liveness_probe: Some(tcp_liveness_probe(JOB_MANAGER_RPC_PORT)),
        security_context: Some(SecurityContext {
            run_as_user: Some(0),
            ..Default::default()
        }),
        lifecycle: Some(post_start(
            "mkdir -p /opt/flink/target/flink-web-upload&&chown -R flink:flink /opt/flink/target/",
        )),
        volume_mounts: Some(vec![
            volume_mount(LOG_VOLUME, LOG_MOUNT_PATH),
            volume_mount(TARGET_VOLUME, TARGET_MOUNT_PATH),
            volume_mount(CONFIG_VOLUME, CONFIG_MOUNT_PATH),
        ]),
        resources: resource_requirements(&ctx.request.job_manager.resource, None),
        ..Default::default()
    }
}

fn generate_task_manager_container(ctx: &ClusterContext<'_>) -> Container {
    Container {
        name: "taskmanager".to_string(),
        image: Some(ctx.request.image.clone()),
        args: Some(vec!["taskmanager".to_string()]),
        env: env_vars(&ctx.request.env),
        ports: Some(vec![
            container_port("rpc", TASK_MANAGER_RPC_PORT),
            container_port("query-state", QUERY_STATE_PORT),
        ]),
        liveness_probe: Some(tcp_liveness_probe(TASK_MANAGER_RPC_PORT)),
        lifecycle: Some(post_start("chown 9999:9999 /opt/flink/log")),
        volume_mounts: Some(vec![
            volume_mount(LOG_VOLUME, LOG_MOUNT_PATH),
            volume_mount(CONFIG_VOLUME, CONFIG_MOUNT_PATH),
        ]),
        resources: resource_requirements(
            &ctx.request.task_manager.resource,
            Some(TASK_MANAGER_CPU_REQUEST),
        ),
        ..Default::default()
    }
}

fn generate_sidecar_container(sidecar: &SideCar) -> Container {
    Container {
        name: sidecar.name.clone(),
        image: Some(sidecar.image.clone()),
        command: Some(sidecar.command.clone()),
        env: if sidecar.env.is_empty() {
            None
        } else {
            Some(sidecar.env.clone())
        },
        volume_mounts: if sidecar.volume_mounts.is_empty() {
            None
        } else {
            Some(sidecar.volume_mounts.clone())
        },
        liveness_probe: sidecar.liveness_probe.clone(),
        ..Default::default()
    }
}

fn env_vars(env: &BTreeMap<String, String>) -> Option<Vec<EnvVar>> {
    if env.is_empty() {
        return None;
    }
    Some(
        env.iter()
            .map(|(name, value)| EnvVar {
                name: name.clone(),
                value: Some(value.clone()),
                ..Default::default()
            })
            .collect(),
    )
}

fn container_port(name: &str, port: i32) -> ContainerPort {
    ContainerPort {
        name: Some(name.to_string()),
        container_port: port,
        ..Default::default()
    }
}

fn tcp_liveness_probe(port: i32) -> Probe {
    Probe {
        tcp_socket: Some(TCPSocketAction {
            port: IntOrString::Int(port),
            ..Default::default()
        }),
        initial_delay_seconds: Some(PROBE_INITIAL_DELAY_SECONDS),
        period_seconds: Some(PROBE_PERIOD_SECONDS),
        ..Default::default()
    }
}

fn post_start(script: &str) -> Lifecycle {
    Lifecycle {
        post_start: Some(LifecycleHandler {
            exec: Some(ExecAction {
                command: Some(vec![
                    "/bin/sh".to_string(),
                    "-c".to_string(),
                    script.to_string(),
                ]),
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn volume_mount(name: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        ..Default::default()
    }
}

fn log_volume(ctx: &ClusterContext<'_>) -> Volume {
    Volume {
        name: LOG_VOLUME.to_string(),
        host_path: Some(HostPathVolumeSource {
            path: format!("/mnt/log/{}-flink/", ctx.name),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn config_volume(ctx: &ClusterContext<'_>) -> Volume {
    Volume {
        name: CONFIG_VOLUME.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: ctx.name.config_map(),
            items: Some(vec![
                KeyToPath {
                    key: FLINK_CONF_FILE.to_string(),
                    path: FLINK_CONF_FILE.to_string(),
                    ..Default::default()
                },
                KeyToPath {
                    key: LOGBACK_FILE.to_string(),
                    path: LOGBACK_FILE.to_string(),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        }),
        ..Default::default()
    }
}
