//! HTTP routes over the fake endpoint.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use flink_k8s_manager::naming::ResourceKind;
use flink_k8s_manager::{HealthState, app_router};
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::{ALIAS, FakeGateway, Op, service_for};

fn router(fake: &Arc<FakeGateway>) -> (Router, Arc<HealthState>) {
    let health = Arc::new(HealthState::new());
    let service = Arc::new(service_for(fake).with_health(health.clone()));
    (app_router(service, health.clone()), health)
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, value)
}

fn create_body() -> Value {
    json!({
        "name": "demo",
        "namespace": "default",
        "owner": "bob",
        "taskManager": { "replicas": 2 },
        "flinkConfiguration": { "taskmanager.numberOfTaskSlots": 4 }
    })
}

#[tokio::test]
async fn test_list_registered_endpoints() {
    let fake = FakeGateway::new();
    let (router, _) = router(&fake);

    let (status, body) = send(&router, "GET", "/api/v1/clusters", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{ "alias": ALIAS, "name": "fake-test" }]));
}

#[tokio::test]
async fn test_create_then_list_over_http() {
    let fake = FakeGateway::new();
    let (router, _) = router(&fake);

    let (status, body) = send(&router, "POST", "/api/v1/clusters/test/flink", Some(create_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["cluster"], "demo");
    assert_eq!(body["resources"].as_array().unwrap().len(), 5);
    assert_eq!(body["resources"][0]["kind"], "pvc");

    let (status, body) = send(
        &router,
        "GET",
        "/api/v1/clusters/test/flink?namespace=default&owner=bob",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["name"], "demo");
    assert_eq!(body["items"][0]["info"]["replicas"], 2);
    assert_eq!(
        body["items"][0]["flinkConfiguration"]["taskmanager.numberOfTaskSlots"],
        "4"
    );
}

#[tokio::test]
async fn test_validation_error_is_bad_request() {
    let fake = FakeGateway::new();
    let (router, _) = router(&fake);

    let (status, body) = send(
        &router,
        "POST",
        "/api/v1/clusters/test/flink",
        Some(json!({ "name": "Test_Cluster" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Test_Cluster"));
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn test_unknown_alias_is_not_found() {
    let fake = FakeGateway::new();
    let (router, _) = router(&fake);

    let (status, body) = send(&router, "GET", "/api/v1/clusters/prod/flink", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "cluster prod not found");
}

#[tokio::test]
async fn test_partial_failure_body() {
    let fake = FakeGateway::new();
    fake.fail(ResourceKind::ConfigMap, Op::Apply);
    let (router, _) = router(&fake);

    let (status, body) = send(&router, "POST", "/api/v1/clusters/test/flink", Some(create_body())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let failures = body["failures"].as_array().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["kind"], "configmap");
    assert_eq!(body["outcome"]["resources"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_transport_error_is_bad_gateway() {
    let fake = FakeGateway::new();
    fake.fail(ResourceKind::JobManagerDeployment, Op::Create);
    let (router, _) = router(&fake);

    let (status, body) = send(&router, "POST", "/api/v1/clusters/test/flink", Some(create_body())).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "jobmanager-deployment");
}

#[tokio::test]
async fn test_mutations_over_http() {
    let fake = FakeGateway::new();
    let (router, _) = router(&fake);
    send(&router, "POST", "/api/v1/clusters/test/flink", Some(create_body())).await;

    let base = "/api/v1/clusters/test/flink/default/demo";

    let (status, _) = send(&router, "PATCH", base, Some(json!({ "labels": { "team": "data" } }))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&router, "POST", &format!("{base}/scale"), Some(json!({ "replicas": 4 }))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let tm = fake.deployment("default", "demo-taskmanager").unwrap();
    assert_eq!(tm.spec.unwrap().replicas, Some(4));

    let (status, _) = send(&router, "POST", &format!("{base}/restart"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &router,
        "POST",
        &format!("{base}/restart"),
        Some(json!({ "target": "taskmanager" })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&router, "DELETE", base, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(fake.object_count(), 0);

    let (status, _) = send(&router, "DELETE", base, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_patch_reserved_label_is_bad_request() {
    let fake = FakeGateway::new();
    let (router, _) = router(&fake);
    send(&router, "POST", "/api/v1/clusters/test/flink", Some(create_body())).await;

    let (status, body) = send(
        &router,
        "PATCH",
        "/api/v1/clusters/test/flink/default/demo",
        Some(json!({ "labels": { "app": "other" } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("'app'"));
}

#[tokio::test]
async fn test_invalid_restart_target() {
    let fake = FakeGateway::new();
    let (router, _) = router(&fake);

    let (status, _) = send(
        &router,
        "POST",
        "/api/v1/clusters/test/flink/default/demo/restart",
        Some(json!({ "target": "everything" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn test_probe_routes() {
    let fake = FakeGateway::new();
    let (router, health) = router(&fake);

    let (status, _) = send(&router, "GET", "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&router, "GET", "/readyz", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    health.set_ready(true).await;
    let (status, _) = send(&router, "GET", "/readyz", None).await;
    assert_eq!(status, StatusCode::OK);

    send(&router, "GET", "/api/v1/clusters/test/flink", None).await;
    let (status, body) = send(&router, "GET", "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_str().unwrap().contains("operation=\"list\""));
}
