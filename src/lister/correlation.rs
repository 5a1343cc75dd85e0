//! Grouping Deployments into logical clusters.
//!
//! The role comes from the `component` label when present and consistent with
//! the name, otherwise from the name suffix. The logical name is taken from
//! the `app` label when `app + suffix` reproduces the Deployment name, which
//! keeps names like `etl-jobmanager-jobmanager` unambiguous.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::Deployment;

use crate::naming::ManagerRole;
use crate::resources::common::{LABEL_APP, LABEL_COMPONENT};

/// Logical name and role of one Deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correlation {
    pub logical_name: String,
    pub role: ManagerRole,
}

/// Work out which cluster and role a Deployment belongs to
pub fn correlate(deployment: &Deployment) -> Option<Correlation> {
    let name = deployment.metadata.name.as_deref()?;
    let labels = deployment.metadata.labels.as_ref();

    let labelled_role = labels
        .and_then(|l| l.get(LABEL_COMPONENT))
        .and_then(|v| ManagerRole::from_label_value(v))
        .filter(|role| name.ends_with(role.suffix()));
    let role = labelled_role.or_else(|| ManagerRole::from_suffix(name))?;

    let from_label = labels
        .and_then(|l| l.get(LABEL_APP))
        .filter(|app| !app.is_empty() && format!("{}{}", app, role.suffix()) == name)
        .cloned();
    let logical_name = match from_label {
        Some(app) => app,
        None => name.strip_suffix(role.suffix())?.to_string(),
    };
    if logical_name.is_empty() {
        return None;
    }

    Some(Correlation { logical_name, role })
}

/// Deployments of one logical cluster
#[derive(Debug, Default)]
pub struct DeploymentPair<'a> {
    pub job_manager: Option<&'a Deployment>,
    pub task_manager: Option<&'a Deployment>,
    /// First Deployment seen; seeds labels and namespace
    pub first: Option<&'a Deployment>,
}

/// Group Deployments by logical name, in name order.
///
/// Deployments with no recognizable role are dropped. If two Deployments
/// claim the same slot, the first one wins.
pub fn group(deployments: &[Deployment]) -> BTreeMap<String, DeploymentPair<'_>> {
    let mut groups: BTreeMap<String, DeploymentPair<'_>> = BTreeMap::new();
    for deployment in deployments {
        let Some(Correlation { logical_name, role }) = correlate(deployment) else {
            continue;
        };
        let pair = groups.entry(logical_name).or_default();
        pair.first.get_or_insert(deployment);
        let slot = match role {
            ManagerRole::JobManager => &mut pair.job_manager,
            ManagerRole::TaskManager => &mut pair.task_manager,
        };
        slot.get_or_insert(deployment);
    }
    groups
}
