//! Error types for the lifecycle engine.
//!
//! Every entry point returns [`Error`]. Gateway failures keep the resource kind
//! they came from so callers can tell which object of a logical cluster broke.

use std::fmt;

use thiserror::Error;

use crate::gateway::GatewayError;
use crate::model::CreateOutcome;
use crate::naming::ResourceKind;

/// Error type for all manager operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed request, rejected before any API call
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown cluster alias
    #[error("cluster {0} not found")]
    ClusterNotFound(String),

    /// Load-bearing resources were created but auxiliary ones failed
    #[error("{0}")]
    PartialFailure(Box<PartialFailure>),

    /// A gateway call failed for the given resource kind
    #[error("{kind} request failed: {source}")]
    Transport {
        kind: ResourceKind,
        #[source]
        source: GatewayError,
    },

    /// Listing the Deployments of a namespace failed
    #[error("JobManager and TaskManager Deployment list request failed: {0}")]
    DeploymentList(#[source] GatewayError),

    /// Invalid settings or kubeconfig
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Kubernetes client construction error
    #[error("Kubernetes client error: {0}")]
    Kube(#[from] kube::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Wrap a gateway error with the kind of resource it was issued for
    pub fn transport(kind: ResourceKind, source: GatewayError) -> Self {
        Error::Transport { kind, source }
    }

    /// Check if this error indicates a not-found condition
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::ClusterNotFound(_) => true,
            Error::Transport { source, .. } | Error::DeploymentList(source) => {
                source.is_not_found()
            }
            Error::Kube(kube::Error::Api(e)) => e.code == 404,
            _ => false,
        }
    }

    /// Resource kind the failure originated from, if any
    pub fn kind(&self) -> Option<ResourceKind> {
        match self {
            Error::Transport { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Auxiliary failures collected during a create.
///
/// `outcome` lists the resources that were confirmed, including the
/// JobManager, TaskManager and PVC.
#[derive(Debug)]
pub struct PartialFailure {
    pub outcome: CreateOutcome,
    pub failures: Vec<ResourceFailure>,
}

impl PartialFailure {
    /// Kinds that failed, in the order they were attempted
    pub fn failed_kinds(&self) -> Vec<ResourceKind> {
        self.failures.iter().map(|f| f.kind).collect()
    }
}

impl fmt::Display for PartialFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cluster {} created with {} failed auxiliary resource(s): ",
            self.outcome.cluster,
            self.failures.len()
        )?;
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

/// One failed step of a create
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ResourceFailure {
    pub kind: ResourceKind,
    pub message: String,
}

impl fmt::Display for ResourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Result type alias for manager operations
pub type Result<T> = std::result::Result<T, Error>;
