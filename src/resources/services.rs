//! Service generation for Flink clusters.
//!
//! Creates up to two services:
//! - **JobManager Service**: ClusterIP for RPC, blob and web UI traffic
//! - **LoadBalancer Service**: external web UI access, only when requested

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use rand::Rng;

use crate::model::LoadBalancerSpec;
use crate::naming::ManagerRole;
use crate::resources::common::{
    BLOB_SERVER_PORT, JOB_MANAGER_RPC_PORT, WEB_UI_PORT, non_empty, object_meta,
    pod_selector_labels, standard_labels,
};
use crate::resources::{ClusterContext, NodePortPolicy};

/// Default Kubernetes NodePort range
pub const NODE_PORT_RANGE: std::ops::RangeInclusive<i32> = 30000..=32767;

/// Generate the ClusterIP Service in front of the JobManager.
pub fn generate_service(ctx: &ClusterContext<'_>) -> Service {
    Service {
        metadata: object_meta(
            ctx.name.service(),
            ctx.namespace(),
            standard_labels(&ctx.name, ctx.owner()),
        ),
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(pod_selector_labels(&ctx.name, ManagerRole::JobManager)),
            ports: Some(vec![
                tcp_port("rpc", JOB_MANAGER_RPC_PORT),
                tcp_port("webui", WEB_UI_PORT),
                tcp_port("blob-service", BLOB_SERVER_PORT),
            ]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Generate the LoadBalancer Service for the web UI.
///
/// Under [`NodePortPolicy::Random`] the same random port is used as service
/// port and nodePort. Concurrent creates can pick the same port; the API
/// server rejects the second one.
pub fn generate_load_balancer_service(
    ctx: &ClusterContext<'_>,
    lb: &LoadBalancerSpec,
    policy: NodePortPolicy,
) -> Service {
    // User labels first so the correlation labels always win
    let mut labels = lb.labels.clone();
    labels.extend(standard_labels(&ctx.name, ctx.owner()));

    let mut metadata = object_meta(ctx.name.lb_service(), ctx.namespace(), labels);
    metadata.annotations = non_empty(&lb.annotations);

    let (port, node_port) = match policy {
        NodePortPolicy::Random => {
            let port = random_node_port();
            (port, Some(port))
        }
        NodePortPolicy::Platform => (WEB_UI_PORT, None),
    };

    Service {
        metadata,
        spec: Some(ServiceSpec {
            type_: Some("LoadBalancer".to_string()),
            selector: Some(pod_selector_labels(&ctx.name, ManagerRole::JobManager)),
            ports: Some(vec![ServicePort {
                name: Some("webui".to_string()),
                protocol: Some("TCP".to_string()),
                port,
                node_port,
                target_port: Some(IntOrString::Int(WEB_UI_PORT)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn random_node_port() -> i32 {
    rand::thread_rng().gen_range(NODE_PORT_RANGE)
}

fn tcp_port(name: &str, port: i32) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        protocol: Some("TCP".to_string()),
        port,
        target_port: Some(IntOrString::Int(port)),
        ..Default::default()
    }
}
