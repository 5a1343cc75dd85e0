//! flink-k8s-manager library crate
//!
//! Lifecycle engine for Flink 1.12 session clusters. A logical cluster is
//! backed by up to six Kubernetes objects; this crate names them, synthesizes
//! them, drives create/apply/delete against any registered endpoint and
//! rebuilds logical views from what is live.

pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod health;
pub mod lister;
pub mod model;
pub mod naming;
pub mod orchestrator;
pub mod registry;
pub mod resources;
pub mod service;
pub mod validation;

pub use error::{Error, Result};
pub use health::HealthState;
pub use registry::ClusterRegistry;
pub use service::FlinkClusterService;

use std::sync::Arc;

use axum::Router;

/// API and probe routes on one router
pub fn app_router(service: Arc<FlinkClusterService>, health: Arc<HealthState>) -> Router {
    api::create_router(service).merge(health::create_router(health))
}
