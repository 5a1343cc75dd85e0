//! HTTP surface over [`FlinkClusterService`].
//!
//! ```text
//! GET    /api/v1/clusters
//! GET    /api/v1/clusters/{alias}/flink?namespace=&owner=&name=
//! POST   /api/v1/clusters/{alias}/flink
//! PATCH  /api/v1/clusters/{alias}/flink/{namespace}/{name}
//! DELETE /api/v1/clusters/{alias}/flink/{namespace}/{name}
//! POST   /api/v1/clusters/{alias}/flink/{namespace}/{name}/scale
//! POST   /api/v1/clusters/{alias}/flink/{namespace}/{name}/restart
//! ```

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use serde::Serialize;

use crate::error::{Error, PartialFailure, ResourceFailure};
use crate::model::{
    ApplyClusterRequest, ClusterFilter, CreateClusterRequest, CreateOutcome, DeleteClusterRequest,
    RestartRequest, ScaleRequest,
};
use crate::service::FlinkClusterService;

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Wraps [`Error`] for conversion into a response
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<CreateOutcome>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failures: Vec<ResourceFailure>,
}

/// HTTP status for an error
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::ClusterNotFound(_) => StatusCode::NOT_FOUND,
        Error::Transport { .. } | Error::DeploymentList(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = status_for(&err);
        let mut body = ErrorBody {
            error: err.to_string(),
            kind: err.kind().map(|k| k.to_string()),
            outcome: None,
            failures: Vec::new(),
        };
        if let Error::PartialFailure(partial) = err {
            let PartialFailure { outcome, failures } = *partial;
            body.outcome = Some(outcome);
            body.failures = failures;
        }
        (status, Json(body)).into_response()
    }
}

/// Router for the cluster API
pub fn create_router(service: Arc<FlinkClusterService>) -> Router {
    Router::new()
        .route("/api/v1/clusters", get(list_endpoints))
        .route(
            "/api/v1/clusters/{alias}/flink",
            get(list_clusters).post(create_cluster),
        )
        .route(
            "/api/v1/clusters/{alias}/flink/{namespace}/{name}",
            patch(apply_cluster).delete(delete_cluster),
        )
        .route(
            "/api/v1/clusters/{alias}/flink/{namespace}/{name}/scale",
            post(scale_cluster),
        )
        .route(
            "/api/v1/clusters/{alias}/flink/{namespace}/{name}/restart",
            post(restart_cluster),
        )
        .with_state(service)
}

async fn list_endpoints(State(service): State<Arc<FlinkClusterService>>) -> impl IntoResponse {
    Json(service.clusters())
}

async fn list_clusters(
    State(service): State<Arc<FlinkClusterService>>,
    Path(alias): Path<String>,
    Query(filter): Query<ClusterFilter>,
) -> ApiResult<impl IntoResponse> {
    let list = service.list_logical_clusters(&alias, &filter).await?;
    Ok(Json(list))
}

async fn create_cluster(
    State(service): State<Arc<FlinkClusterService>>,
    Path(alias): Path<String>,
    Json(request): Json<CreateClusterRequest>,
) -> ApiResult<impl IntoResponse> {
    let outcome = service.create_logical_cluster(&alias, &request).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn apply_cluster(
    State(service): State<Arc<FlinkClusterService>>,
    Path((alias, namespace, name)): Path<(String, String, String)>,
    Json(update): Json<ApplyClusterRequest>,
) -> ApiResult<StatusCode> {
    service
        .apply_logical_cluster(&alias, &namespace, &name, &update)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_cluster(
    State(service): State<Arc<FlinkClusterService>>,
    Path((alias, namespace, name)): Path<(String, String, String)>,
) -> ApiResult<StatusCode> {
    service
        .delete_logical_cluster(&alias, &DeleteClusterRequest::new(namespace, name))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn scale_cluster(
    State(service): State<Arc<FlinkClusterService>>,
    Path((alias, namespace, name)): Path<(String, String, String)>,
    Json(request): Json<ScaleRequest>,
) -> ApiResult<StatusCode> {
    service
        .scale_task_managers(&alias, &namespace, &name, request.replicas)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// An empty body restarts both managers
async fn restart_cluster(
    State(service): State<Arc<FlinkClusterService>>,
    Path((alias, namespace, name)): Path<(String, String, String)>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let request = if body.is_empty() {
        RestartRequest::default()
    } else {
        serde_json::from_slice::<RestartRequest>(&body)
            .map_err(|e| Error::Validation(format!("invalid restart request: {}", e)))?
    };
    service
        .restart(&alias, &namespace, &name, request.target)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
