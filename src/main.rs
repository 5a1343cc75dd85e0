//! flink-k8s-manager - lifecycle service for Flink 1.12 clusters on Kubernetes.
//!
//! Startup:
//! - Initializes structured logging
//! - Loads settings and connects to every configured endpoint
//! - Serves the cluster API and the probe routes on one listener

use std::sync::Arc;

use tokio::signal;
use tracing::info;

use flink_k8s_manager::config::Settings;
use flink_k8s_manager::resources::SynthesisOptions;
use flink_k8s_manager::{ClusterRegistry, FlinkClusterService, HealthState, app_router};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("flink_k8s_manager=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .json()
        .init();

    info!("Starting flink-k8s-manager");

    let settings = Settings::load()?;
    let addr = settings.socket_addr()?;

    let registry = ClusterRegistry::connect(&settings).await?;
    info!(clusters = registry.len(), "Connected to Kubernetes endpoints");

    let health_state = Arc::new(HealthState::new());
    let service = Arc::new(
        FlinkClusterService::new(
            registry,
            SynthesisOptions {
                node_port: settings.node_port_policy,
            },
        )
        .with_health(health_state.clone()),
    );

    let app = app_router(service, health_state.clone());
    let listener = tokio::net::TcpListener::bind(addr).await?;
    health_state.set_ready(true).await;
    info!(addr = %addr, "Serving API");

    axum::serve(listener, app)
        .with_graceful_shutdown({
            let health_state = health_state.clone();
            async move {
                shutdown_signal().await;
                info!("Received shutdown signal, draining in-flight requests");
                health_state.set_ready(false).await;
            }
        })
        .await?;

    info!("flink-k8s-manager stopped");
    Ok(())
}

/// Wait for SIGTERM or SIGINT.
///
/// Without the handlers the process cannot stop gracefully, so failing to
/// install them is fatal.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
