//! Validation for create requests.
//!
//! Everything here runs before the first API call, so a rejected request never
//! leaves objects behind:
//! - Cluster name (DNS-1123 label, room for the longest suffix)
//! - Owner label value and LoadBalancer labels
//! - Flink configuration keys and values
//! - CPU and memory quantities
//! - Replica count and PVC size
//! - Sidecars
//! - Optional job (JAR URI, upgrade mode)
//!
//! Apply requests get the label and configuration checks, and may not touch the
//! correlation labels.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::{Error, Result};
use crate::model::{ApplyClusterRequest, CreateClusterRequest, JobSpec, ResourceSpec, SideCar};
use crate::naming::{ClusterName, is_dns_label};
use crate::resources::common::{LABEL_APP, LABEL_COMPONENT, LABEL_OWNER};

/// Maximum length of a label value
pub const MAX_LABEL_VALUE_LEN: usize = 63;

/// Maximum length of a label key prefix (a DNS subdomain)
pub const MAX_LABEL_PREFIX_LEN: usize = 253;

/// Labels the lister correlates on; only the manager writes them
pub const RESERVED_LABELS: [&str; 3] = [LABEL_APP, LABEL_COMPONENT, LABEL_OWNER];

/// Accepted JAR URI schemes
pub const JAR_URI_SCHEMES: [&str; 3] = ["local://", "http://", "https://"];

/// How a job's state is carried across upgrades
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeMode {
    Stateless,
    Savepoint,
    LastState,
}

impl UpgradeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            UpgradeMode::Stateless => "stateless",
            UpgradeMode::Savepoint => "savepoint",
            UpgradeMode::LastState => "last-state",
        }
    }
}

impl fmt::Display for UpgradeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpgradeMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stateless" => Ok(UpgradeMode::Stateless),
            "savepoint" => Ok(UpgradeMode::Savepoint),
            "last-state" => Ok(UpgradeMode::LastState),
            other => Err(Error::Validation(format!(
                "invalid upgrade mode '{}'. Expected one of: stateless, savepoint, last-state",
                other
            ))),
        }
    }
}

/// Validate a create request, returning the checked cluster name
pub fn validate_create_request(request: &CreateClusterRequest) -> Result<ClusterName> {
    let name = ClusterName::new(request.name.as_str())?;
    validate_namespace(&request.namespace)?;
    if let Some(owner) = request.owner.as_deref().filter(|o| !o.is_empty()) {
        validate_label_value("owner", owner)?;
    }
    if request.image.trim().is_empty() {
        return Err(Error::Validation("image must not be empty".to_string()));
    }
    validate_resources(
        "jobManager",
        &request.job_manager.resource,
        request.strict_validation,
    )?;
    validate_resources(
        "taskManager",
        &request.task_manager.resource,
        request.strict_validation,
    )?;
    validate_replicas(request.task_manager.replicas)?;
    validate_pvc_size(request.job_manager.pvc_size)?;
    for sidecar in &request.job_manager.sidecars {
        validate_sidecar(sidecar)?;
    }
    if let Some(lb) = &request.load_balancer {
        for (key, value) in &lb.labels {
            validate_label(key, value)?;
        }
    }
    validate_flink_configuration(&request.flink_configuration)?;
    if let Some(job) = &request.job {
        validate_job(job)?;
    }
    Ok(name)
}

/// Validate an apply request.
///
/// Labels must be valid and must not name a reserved label. The configuration
/// gets the same checks as on create.
pub fn validate_apply_request(update: &ApplyClusterRequest) -> Result<()> {
    if let Some(labels) = &update.labels {
        for (key, value) in labels {
            if RESERVED_LABELS.contains(&key.as_str()) {
                return Err(Error::Validation(format!(
                    "label '{}' is managed by flink-k8s-manager and cannot be changed",
                    key
                )));
            }
            validate_label(key, value)?;
        }
    }
    if let Some(conf) = &update.flink_configuration {
        validate_flink_configuration(conf)?;
    }
    Ok(())
}

/// Validate Flink configuration entries.
///
/// Each entry must render as exactly one `key: value` line.
pub fn validate_flink_configuration(conf: &BTreeMap<String, String>) -> Result<()> {
    for (key, value) in conf {
        let valid_key = !key.is_empty()
            && key.trim() == key
            && !key.starts_with('#')
            && !key.contains([':', '\n', '\r']);
        if !valid_key {
            return Err(Error::Validation(format!(
                "invalid flinkConfiguration key '{}'",
                key.escape_debug()
            )));
        }
        if value.contains(['\n', '\r']) {
            return Err(Error::Validation(format!(
                "flinkConfiguration value for '{}' must be a single line",
                key
            )));
        }
    }
    Ok(())
}

/// Validate a namespace name
pub fn validate_namespace(namespace: &str) -> Result<()> {
    if namespace.len() > MAX_LABEL_VALUE_LEN || !is_dns_label(namespace) {
        return Err(Error::Validation(format!(
            "invalid namespace '{}'",
            namespace
        )));
    }
    Ok(())
}

/// Validate a TaskManager replica count
pub fn validate_replicas(replicas: i32) -> Result<()> {
    if replicas < 0 {
        return Err(Error::Validation(format!(
            "taskManager replica count {} must not be negative",
            replicas
        )));
    }
    Ok(())
}

fn validate_pvc_size(size: i32) -> Result<()> {
    if size < 1 {
        return Err(Error::Validation(format!(
            "jobManager pvcSize {} must be at least 1 (GiB)",
            size
        )));
    }
    Ok(())
}

fn validate_label(key: &str, value: &str) -> Result<()> {
    static LABEL_NAME_RE: LazyLock<Option<regex::Regex>> = LazyLock::new(|| {
        regex::Regex::new(r"^[A-Za-z0-9]([-A-Za-z0-9_.]*[A-Za-z0-9])?$").ok()
    });
    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };
    let valid_prefix = prefix.is_none_or(|p| {
        p.len() <= MAX_LABEL_PREFIX_LEN && !p.is_empty() && p.split('.').all(is_dns_label)
    });
    let valid_name = name.len() <= MAX_LABEL_VALUE_LEN
        && LABEL_NAME_RE.as_ref().is_some_and(|re| re.is_match(name));
    if !valid_prefix || !valid_name {
        return Err(Error::Validation(format!(
            "label key '{}' is not a valid label key",
            key
        )));
    }
    validate_label_value(&format!("label '{}' value", key), value)
}

fn validate_label_value(field: &str, value: &str) -> Result<()> {
    static LABEL_VALUE_RE: LazyLock<Option<regex::Regex>> = LazyLock::new(|| {
        regex::Regex::new(r"^([A-Za-z0-9]([-A-Za-z0-9_.]*[A-Za-z0-9])?)?$").ok()
    });
    let valid = value.len() <= MAX_LABEL_VALUE_LEN
        && LABEL_VALUE_RE.as_ref().is_some_and(|re| re.is_match(value));
    if !valid {
        return Err(Error::Validation(format!(
            "{} '{}' is not a valid label value",
            field, value
        )));
    }
    Ok(())
}

fn validate_resources(component: &str, resource: &ResourceSpec, strict: bool) -> Result<()> {
    if let Some(cpu) = &resource.cpu
        && !is_valid_cpu(cpu)
    {
        return Err(Error::Validation(format!(
            "invalid {} CPU '{}'. Expected format: <number>m or <decimal> (e.g., 500m, 0.5, 2)",
            component, cpu
        )));
    }

    if let Some(memory) = &resource.memory {
        let valid = if strict {
            is_valid_strict_memory(memory)
        } else {
            is_valid_memory(memory)
        };
        if !valid {
            let expected = if strict {
                "<number>Mi or <number>Gi (e.g., 2048Mi, 4Gi)"
            } else {
                "<number><unit> (e.g., 2048Mi, 4Gi)"
            };
            return Err(Error::Validation(format!(
                "invalid {} memory '{}'. Expected format: {}",
                component, memory, expected
            )));
        }
    }

    Ok(())
}

fn validate_sidecar(sidecar: &SideCar) -> Result<()> {
    if sidecar.name.is_empty() || !is_dns_label(&sidecar.name) {
        return Err(Error::Validation(format!(
            "invalid sidecar name '{}'",
            sidecar.name
        )));
    }
    if sidecar.image.trim().is_empty() {
        return Err(Error::Validation(format!(
            "sidecar '{}' requires an image",
            sidecar.name
        )));
    }
    if sidecar.command.is_empty() {
        return Err(Error::Validation(format!(
            "sidecar '{}' requires a command",
            sidecar.name
        )));
    }
    Ok(())
}

/// Validate an optional job block
pub fn validate_job(job: &JobSpec) -> Result<Option<UpgradeMode>> {
    let jar_uri = job
        .jar_uri
        .as_deref()
        .filter(|uri| !uri.is_empty())
        .ok_or_else(|| Error::Validation("job.jarUri is required".to_string()))?;
    if !JAR_URI_SCHEMES.iter().any(|s| jar_uri.starts_with(s))
        || jar_uri.contains(char::is_whitespace)
    {
        return Err(Error::Validation(format!(
            "invalid job.jarUri '{}'. Must start with local://, http:// or https://",
            jar_uri
        )));
    }
    if let Some(parallelism) = job.parallelism
        && parallelism < 1
    {
        return Err(Error::Validation(format!(
            "job.parallelism {} must be at least 1",
            parallelism
        )));
    }
    job.upgrade_mode
        .as_deref()
        .map(UpgradeMode::from_str)
        .transpose()
}

/// Check if a CPU string is valid
fn is_valid_cpu(cpu: &str) -> bool {
    // Pattern: ^([0-9]+m?|[0-9]*\.[0-9]+)$
    static CPU_RE: LazyLock<Option<regex::Regex>> =
        LazyLock::new(|| regex::Regex::new(r"^([0-9]+m?|[0-9]*\.[0-9]+)$").ok());
    CPU_RE.as_ref().is_some_and(|re| re.is_match(cpu))
}

/// Check if a memory string is a Kubernetes quantity
fn is_valid_memory(memory: &str) -> bool {
    static MEMORY_RE: LazyLock<Option<regex::Regex>> = LazyLock::new(|| {
        regex::Regex::new(r"^[0-9]+(\.[0-9]+)?(k|M|G|T|P|E|Ki|Mi|Gi|Ti|Pi|Ei)?$").ok()
    });
    MEMORY_RE.as_ref().is_some_and(|re| re.is_match(memory))
}

/// Check if a memory string uses Mi or Gi
fn is_valid_strict_memory(memory: &str) -> bool {
    static STRICT_MEMORY_RE: LazyLock<Option<regex::Regex>> =
        LazyLock::new(|| regex::Regex::new(r"^[0-9]+(Mi|Gi)$").ok());
    STRICT_MEMORY_RE.as_ref().is_some_and(|re| re.is_match(memory))
}
