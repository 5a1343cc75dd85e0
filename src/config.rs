//! Settings file and environment overrides.
//!
//! ```yaml
//! listenAddr: 0.0.0.0:8080
//! nodePortPolicy: random
//! clusters:
//!   test:
//!     name: tke-test
//!     kubePath: ~/.kube/test.yaml
//!   prod:
//!     name: tke-prod
//!     kubeConfig: <base64 kubeconfig>
//! ```

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::resources::NodePortPolicy;

/// Env var naming the settings file
pub const CONFIG_PATH_ENV: &str = "FLINK_MANAGER_CONFIG";
/// Env var overriding the listen address
pub const LISTEN_ADDR_ENV: &str = "FLINK_MANAGER_LISTEN";
/// Settings file used when the env var is unset
pub const DEFAULT_CONFIG_PATH: &str = "config/clusters.yaml";

/// Process settings
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default)]
    pub node_port_policy: NodePortPolicy,

    /// Query each API server while building the registry
    #[serde(default = "default_verify_connections")]
    pub verify_connections: bool,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    /// Alias to connection
    #[serde(default)]
    pub clusters: BTreeMap<String, ClusterConnection>,
}

/// How to reach one Kubernetes endpoint
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConnection {
    /// Display name
    #[serde(default)]
    pub name: String,

    /// Kubeconfig file; `~/` is expanded. Wins over `kube_config`.
    #[serde(default)]
    pub kube_path: Option<String>,

    /// Base64 encoded kubeconfig
    #[serde(default)]
    pub kube_config: Option<String>,
}

/// Where a kubeconfig comes from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KubeconfigSource {
    Path(PathBuf),
    Inline(String),
}

impl ClusterConnection {
    pub fn source(&self, alias: &str) -> Result<KubeconfigSource> {
        if let Some(path) = self.kube_path.as_deref().filter(|p| !p.is_empty()) {
            return Ok(KubeconfigSource::Path(expand_home(path)));
        }
        if let Some(encoded) = self.kube_config.as_deref().filter(|c| !c.is_empty()) {
            return Ok(KubeconfigSource::Inline(encoded.to_string()));
        }
        Err(Error::Configuration(format!(
            "cluster {} needs kubePath or kubeConfig",
            alias
        )))
    }
}

impl Settings {
    /// Load from the file named by `FLINK_MANAGER_CONFIG`, then apply env overrides
    pub fn load() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut settings = Self::load_from(Path::new(&path))?;
        if let Ok(addr) = std::env::var(LISTEN_ADDR_ENV) {
            settings.listen_addr = addr;
        }
        settings.validate()?;
        Ok(settings)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.clusters.is_empty() {
            return Err(Error::Configuration("no clusters configured".to_string()));
        }
        for (alias, conn) in &self.clusters {
            conn.source(alias)?;
        }
        self.socket_addr()?;
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_addr.parse().map_err(|e| {
            Error::Configuration(format!("invalid listen address {}: {}", self.listen_addr, e))
        })
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_verify_connections() -> bool {
    true
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_read_timeout_secs() -> u64 {
    30
}
