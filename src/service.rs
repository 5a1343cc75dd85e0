//! Entry points for the lifecycle engine.
//!
//! [`FlinkClusterService`] resolves the target alias, validates the request and
//! hands off to the orchestrator or lister. Each call is counted and timed.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::error::Result;
use crate::health::HealthState;
use crate::lister;
use crate::model::{
    ApplyClusterRequest, ClusterFilter, ClusterList, CreateClusterRequest, CreateOutcome,
    DeleteClusterRequest, RestartTarget,
};
use crate::naming::ClusterName;
use crate::orchestrator;
use crate::registry::{ClusterRegistry, RegisteredCluster};
use crate::resources::{SynthesisOptions, synthesize};
use crate::validation::validate_namespace;

pub struct FlinkClusterService {
    registry: ClusterRegistry,
    options: SynthesisOptions,
    health: Option<Arc<HealthState>>,
}

impl FlinkClusterService {
    pub fn new(registry: ClusterRegistry, options: SynthesisOptions) -> Self {
        Self {
            registry,
            options,
            health: None,
        }
    }

    /// Record metrics into `health`
    pub fn with_health(mut self, health: Arc<HealthState>) -> Self {
        health.metrics.set_registered_clusters(self.registry.len());
        self.health = Some(health);
        self
    }

    /// Registered endpoints, sorted by alias
    pub fn clusters(&self) -> Vec<RegisteredCluster> {
        self.registry.clusters()
    }

    /// Synthesize and create every object of a logical cluster
    pub async fn create_logical_cluster(
        &self,
        alias: &str,
        request: &CreateClusterRequest,
    ) -> Result<CreateOutcome> {
        self.observe(alias, "create", async {
            let gateway = self.registry.gateway(alias)?;
            let specs = synthesize(request, &self.options)?;
            orchestrator::create(gateway.as_ref(), &specs).await
        })
        .await
    }

    pub async fn apply_logical_cluster(
        &self,
        alias: &str,
        namespace: &str,
        cluster_name: &str,
        update: &ApplyClusterRequest,
    ) -> Result<()> {
        self.observe(alias, "apply", async {
            let gateway = self.registry.gateway(alias)?;
            validate_namespace(namespace)?;
            let name = ClusterName::new(cluster_name)?;
            orchestrator::apply(gateway.as_ref(), namespace, &name, update).await
        })
        .await
    }

    pub async fn delete_logical_cluster(
        &self,
        alias: &str,
        request: &DeleteClusterRequest,
    ) -> Result<()> {
        self.observe(alias, "delete", async {
            let gateway = self.registry.gateway(alias)?;
            validate_namespace(&request.namespace)?;
            let name = ClusterName::new(request.cluster_name.as_str())?;
            orchestrator::delete(gateway.as_ref(), &request.namespace, &name).await
        })
        .await
    }

    pub async fn list_logical_clusters(
        &self,
        alias: &str,
        filter: &ClusterFilter,
    ) -> Result<ClusterList> {
        self.observe(alias, "list", async {
            let gateway = self.registry.gateway(alias)?;
            validate_namespace(&filter.namespace)?;
            lister::list(gateway.as_ref(), filter).await
        })
        .await
    }

    pub async fn scale_task_managers(
        &self,
        alias: &str,
        namespace: &str,
        cluster_name: &str,
        replicas: i32,
    ) -> Result<()> {
        self.observe(alias, "scale", async {
            let gateway = self.registry.gateway(alias)?;
            validate_namespace(namespace)?;
            let name = ClusterName::new(cluster_name)?;
            orchestrator::scale_task_managers(gateway.as_ref(), namespace, &name, replicas).await
        })
        .await
    }

    pub async fn restart(
        &self,
        alias: &str,
        namespace: &str,
        cluster_name: &str,
        target: RestartTarget,
    ) -> Result<()> {
        self.observe(alias, "restart", async {
            let gateway = self.registry.gateway(alias)?;
            validate_namespace(namespace)?;
            let name = ClusterName::new(cluster_name)?;
            orchestrator::restart(gateway.as_ref(), namespace, &name, target).await
        })
        .await
    }

    async fn observe<T>(
        &self,
        alias: &str,
        operation: &str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let start = Instant::now();
        let result = call.await;
        let elapsed = start.elapsed().as_secs_f64();

        if let Some(health) = &self.health {
            health.metrics.record_operation(alias, operation, elapsed);
            if result.is_err() {
                health.metrics.record_error(alias, operation);
            }
        }
        match &result {
            Ok(_) => info!(alias = %alias, operation, duration_secs = elapsed, "Operation completed"),
            Err(e) => warn!(alias = %alias, operation, error = %e, "Operation failed"),
        }
        result
    }
}
