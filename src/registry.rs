//! Registry of Kubernetes endpoints, keyed by alias.
//!
//! Built once at startup and never modified. Every operation names its
//! target alias explicitly and gets the matching gateway from here.

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{ClusterConnection, KubeconfigSource, Settings};
use crate::error::{Error, Result};
use crate::gateway::{KubeGateway, ResourceGateway};

/// Alias and display name of a registered endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RegisteredCluster {
    pub alias: String,
    pub name: String,
}

struct Entry {
    name: String,
    gateway: Arc<dyn ResourceGateway>,
}

/// Immutable alias to gateway map
pub struct ClusterRegistry {
    entries: BTreeMap<String, Entry>,
}

impl ClusterRegistry {
    /// Connect to every configured cluster.
    ///
    /// Fails as a whole if any single connection fails.
    pub async fn connect(settings: &Settings) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for (alias, conn) in &settings.clusters {
            let client = connect_cluster(alias, conn, settings).await?;
            info!(alias = %alias, name = %conn.name, "Registered cluster");
            entries.insert(
                alias.clone(),
                Entry {
                    name: conn.name.clone(),
                    gateway: Arc::new(KubeGateway::new(client)),
                },
            );
        }
        Ok(Self { entries })
    }

    /// Build from ready gateways as `(alias, name, gateway)`
    pub fn from_gateways<I>(gateways: I) -> Self
    where
        I: IntoIterator<Item = (String, String, Arc<dyn ResourceGateway>)>,
    {
        let entries = gateways
            .into_iter()
            .map(|(alias, name, gateway)| (alias, Entry { name, gateway }))
            .collect();
        Self { entries }
    }

    /// Gateway for `alias`
    pub fn gateway(&self, alias: &str) -> Result<Arc<dyn ResourceGateway>> {
        self.entries
            .get(alias)
            .map(|e| Arc::clone(&e.gateway))
            .ok_or_else(|| Error::ClusterNotFound(alias.to_string()))
    }

    pub fn clusters(&self) -> Vec<RegisteredCluster> {
        self.entries
            .iter()
            .map(|(alias, e)| RegisteredCluster {
                alias: alias.clone(),
                name: e.name.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

async fn connect_cluster(alias: &str, conn: &ClusterConnection, settings: &Settings) -> Result<Client> {
    let kubeconfig = load_kubeconfig(alias, &conn.source(alias)?)?;

    let mut config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| {
            Error::Configuration(format!("cluster {}: failed to load kubeconfig: {}", alias, e))
        })?;
    config.connect_timeout = Some(settings.connect_timeout());
    config.read_timeout = Some(settings.read_timeout());
    let client = Client::try_from(config)?;

    if settings.verify_connections {
        let version = client.apiserver_version().await.map_err(|e| {
            Error::Configuration(format!("cluster {}: API server unreachable: {}", alias, e))
        })?;
        debug!(alias = %alias, version = %version.git_version, "API server reachable");
    }
    Ok(client)
}

/// Read a kubeconfig from a file or decode it from base64
pub fn load_kubeconfig(alias: &str, source: &KubeconfigSource) -> Result<Kubeconfig> {
    match source {
        KubeconfigSource::Path(path) => Kubeconfig::read_from(path).map_err(|e| {
            Error::Configuration(format!(
                "cluster {}: failed to read kubeconfig {}: {}",
                alias,
                path.display(),
                e
            ))
        }),
        KubeconfigSource::Inline(encoded) => {
            let bytes = STANDARD.decode(encoded.trim()).map_err(|e| {
                Error::Configuration(format!("cluster {}: invalid base64 kubeconfig: {}", alias, e))
            })?;
            let raw = String::from_utf8(bytes).map_err(|e| {
                Error::Configuration(format!("cluster {}: invalid kubeconfig UTF-8: {}", alias, e))
            })?;
            Ok(serde_yaml::from_str(&raw)?)
        }
    }
}
