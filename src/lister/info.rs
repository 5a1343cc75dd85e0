//! Summary projection over a TaskManager Deployment.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

use crate::model::ClusterInfo;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Build [`ClusterInfo`] from a Deployment's spec and status
pub fn cluster_info(deployment: &Deployment) -> ClusterInfo {
    let spec = deployment.spec.as_ref();
    let pod = spec.and_then(|s| s.template.spec.as_ref());
    let containers = pod.map(|p| p.containers.as_slice()).unwrap_or_default();

    let limits = containers
        .first()
        .and_then(|c| c.resources.as_ref())
        .and_then(|r| r.limits.as_ref());

    ClusterInfo {
        create_time: deployment
            .metadata
            .creation_timestamp
            .as_ref()
            .map(|t| t.0.to_string()),
        images: containers.iter().filter_map(|c| c.image.clone()).collect(),
        replicas: spec.and_then(|s| s.replicas).unwrap_or(1),
        ready_replicas: deployment
            .status
            .as_ref()
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0),
        cpu_cores: limits.and_then(|l| l.get("cpu")).and_then(parse_cpu),
        memory_gb: limits
            .and_then(|l| l.get("memory"))
            .and_then(parse_memory_bytes)
            .map(|bytes| bytes / BYTES_PER_GB),
    }
}

/// CPU quantity in cores: `2`, `0.5`, `500m`
pub fn parse_cpu(quantity: &Quantity) -> Option<f64> {
    let value = quantity.0.trim();
    match value.strip_suffix('m') {
        Some(milli) => milli.parse::<f64>().ok().map(|m| m / 1000.0),
        None => value.parse::<f64>().ok(),
    }
}

/// Memory quantity in bytes, binary or decimal suffixes
pub fn parse_memory_bytes(quantity: &Quantity) -> Option<f64> {
    const SUFFIXES: [(&str, f64); 12] = [
        ("Ki", 1024.0),
        ("Mi", 1024.0 * 1024.0),
        ("Gi", 1024.0 * 1024.0 * 1024.0),
        ("Ti", 1024.0 * 1024.0 * 1024.0 * 1024.0),
        ("Pi", 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0),
        ("Ei", 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0),
        ("k", 1e3),
        ("M", 1e6),
        ("G", 1e9),
        ("T", 1e12),
        ("P", 1e15),
        ("E", 1e18),
    ];

    let value = quantity.0.trim();
    for (suffix, multiplier) in SUFFIXES {
        if let Some(number) = value.strip_suffix(suffix) {
            return number.parse::<f64>().ok().map(|n| n * multiplier);
        }
    }
    value.parse::<f64>().ok()
}
