//! Create, apply, delete, scale and restart through [`FlinkClusterService`].

use std::collections::BTreeMap;
use std::sync::Arc;

use flink_k8s_manager::error::Error;
use flink_k8s_manager::model::{
    ApplyClusterRequest, ClusterFilter, DeleteClusterRequest, RestartTarget,
};
use flink_k8s_manager::naming::ResourceKind;
use flink_k8s_manager::resources::common::ANNOTATION_RESTARTED_AT;
use flink_k8s_manager::resources::configmap::FLINK_CONF_FILE;
use flink_k8s_manager::HealthState;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::{ALIAS, CreateClusterRequestBuilder, FakeGateway, Op, service_for};

const NS: &str = "default";

fn demo_request() -> flink_k8s_manager::model::CreateClusterRequest {
    CreateClusterRequestBuilder::new("demo")
        .namespace(NS)
        .owner("bob")
        .task_managers(2)
        .task_manager_resources("2", "4Gi")
        .load_balancer()
        .build()
}

fn restart_annotation(fake: &FakeGateway, name: &str) -> Option<String> {
    fake.deployment(NS, name)?
        .spec?
        .template
        .metadata?
        .annotations?
        .get(ANNOTATION_RESTARTED_AT)
        .cloned()
}

// ============================================================
// Create
// ============================================================

#[tokio::test]
async fn test_create_list_delete_lifecycle() {
    let fake = FakeGateway::new();
    let service = service_for(&fake);

    let outcome = service
        .create_logical_cluster(ALIAS, &demo_request())
        .await
        .unwrap();
    assert_eq!(outcome.cluster, "demo");
    assert_eq!(outcome.resources.len(), 6);
    assert_eq!(fake.object_count(), 6);

    let tm = fake.deployment(NS, "demo-taskmanager").unwrap();
    assert_eq!(tm.spec.unwrap().replicas, Some(2));
    assert_eq!(
        tm.metadata.labels.unwrap().get("owner").map(String::as_str),
        Some("bob")
    );

    let list = service
        .list_logical_clusters(ALIAS, &ClusterFilter::in_namespace(NS).owner("bob"))
        .await
        .unwrap();
    assert_eq!(list.total, 1);
    let view = &list.items[0];
    assert_eq!(view.name, "demo");
    assert_eq!(view.info.as_ref().unwrap().replicas, 2);
    assert_eq!(view.info.as_ref().unwrap().memory_gb, Some(4.0));
    assert_eq!(
        view.flink_configuration
            .get("jobmanager.rpc.address")
            .map(String::as_str),
        Some("demo-jobmanager-service")
    );

    let delete = DeleteClusterRequest::new(NS, "demo");
    service.delete_logical_cluster(ALIAS, &delete).await.unwrap();
    assert_eq!(fake.object_count(), 0);

    // Repeating a finished delete is still a success
    service.delete_logical_cluster(ALIAS, &delete).await.unwrap();

    let list = service
        .list_logical_clusters(ALIAS, &ClusterFilter::in_namespace(NS).owner("bob"))
        .await
        .unwrap();
    assert_eq!(list.total, 0);
}

#[tokio::test]
async fn test_create_submits_load_bearing_objects_first() {
    let fake = FakeGateway::new();
    let service = service_for(&fake);
    service
        .create_logical_cluster(ALIAS, &demo_request())
        .await
        .unwrap();

    let calls = fake.calls();
    assert_eq!(
        calls,
        vec![
            "apply pvc default/demo-pvc",
            "create jobmanager-deployment default/demo-jobmanager",
            "create taskmanager-deployment default/demo-taskmanager",
            "apply configmap default/demo-configmap",
            "apply service default/demo-jobmanager-service",
            "apply lb-service default/demo-jobmanager-lb-service",
        ]
    );
}

#[tokio::test]
async fn test_auxiliary_failures_are_collected() {
    let fake = FakeGateway::new();
    fake.fail(ResourceKind::ConfigMap, Op::Apply);
    fake.fail(ResourceKind::Service, Op::Apply);
    let service = service_for(&fake);

    let err = service
        .create_logical_cluster(ALIAS, &demo_request())
        .await
        .unwrap_err();

    let Error::PartialFailure(partial) = err else {
        panic!("expected partial failure, got {err:?}");
    };
    assert_eq!(
        partial.failed_kinds(),
        vec![ResourceKind::ConfigMap, ResourceKind::Service]
    );
    let confirmed: Vec<_> = partial.outcome.resources.iter().map(|r| r.kind).collect();
    assert_eq!(
        confirmed,
        vec![
            ResourceKind::Pvc,
            ResourceKind::JobManagerDeployment,
            ResourceKind::TaskManagerDeployment,
            ResourceKind::LoadBalancerService,
        ]
    );
    assert!(fake.deployment(NS, "demo-jobmanager").is_some());
    assert!(fake.service(NS, "demo-jobmanager-lb-service").is_some());
}

#[tokio::test]
async fn test_load_bearing_failure_aborts_create() {
    let fake = FakeGateway::new();
    fake.fail(ResourceKind::TaskManagerDeployment, Op::Create);
    let service = service_for(&fake);

    let err = service
        .create_logical_cluster(ALIAS, &demo_request())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ResourceKind::TaskManagerDeployment));

    // No rollback, and nothing after the failing step
    assert!(fake.pvc(NS, "demo-pvc").is_some());
    assert!(fake.deployment(NS, "demo-jobmanager").is_some());
    assert!(fake.config_map(NS, "demo-configmap").is_none());
    assert!(!fake.calls().iter().any(|c| c.starts_with("apply configmap")));
}

#[tokio::test]
async fn test_pvc_failure_stops_before_deployments() {
    let fake = FakeGateway::new();
    fake.fail(ResourceKind::Pvc, Op::Apply);
    let service = service_for(&fake);

    let err = service
        .create_logical_cluster(ALIAS, &demo_request())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Transport {
            kind: ResourceKind::Pvc,
            ..
        }
    ));
    assert_eq!(fake.calls().len(), 1);
    assert_eq!(fake.object_count(), 0);
}

#[tokio::test]
async fn test_create_is_repeatable() {
    let fake = FakeGateway::new();
    let service = service_for(&fake);

    service
        .create_logical_cluster(ALIAS, &demo_request())
        .await
        .unwrap();
    let outcome = service
        .create_logical_cluster(ALIAS, &demo_request())
        .await
        .unwrap();
    assert_eq!(outcome.resources.len(), 6);
    assert_eq!(fake.object_count(), 6);
}

#[tokio::test]
async fn test_invalid_request_makes_no_calls() {
    let fake = FakeGateway::new();
    let service = service_for(&fake);

    let request = CreateClusterRequestBuilder::new("Test_Cluster").build();
    let err = service
        .create_logical_cluster(ALIAS, &request)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let request = CreateClusterRequestBuilder::new("demo")
        .job("file:///x.jar", None)
        .build();
    let err = service
        .create_logical_cluster(ALIAS, &request)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn test_unknown_alias() {
    let fake = FakeGateway::new();
    let service = service_for(&fake);

    let err = service
        .create_logical_cluster("prod", &demo_request())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ClusterNotFound(ref alias) if alias == "prod"));

    let err = service
        .delete_logical_cluster("prod", &DeleteClusterRequest::new(NS, "demo"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ClusterNotFound(_)));
    assert!(fake.calls().is_empty());
}

// ============================================================
// Apply
// ============================================================

#[tokio::test]
async fn test_apply_labels_and_configuration() {
    let fake = FakeGateway::new();
    let service = service_for(&fake);
    service
        .create_logical_cluster(ALIAS, &demo_request())
        .await
        .unwrap();

    let update = ApplyClusterRequest {
        labels: Some(BTreeMap::from([("team".to_string(), "data".to_string())])),
        flink_configuration: Some(BTreeMap::from([(
            "taskmanager.numberOfTaskSlots".to_string(),
            "8".to_string(),
        )])),
    };
    service
        .apply_logical_cluster(ALIAS, NS, "demo", &update)
        .await
        .unwrap();

    for name in ["demo-jobmanager", "demo-taskmanager"] {
        let labels = fake.deployment(NS, name).unwrap().metadata.labels.unwrap();
        assert_eq!(labels.get("team").map(String::as_str), Some("data"));
        // Existing labels survive the merge
        assert_eq!(labels.get("app").map(String::as_str), Some("demo"));
    }

    let data = fake.config_map(NS, "demo-configmap").unwrap().data.unwrap();
    assert_eq!(data[FLINK_CONF_FILE], "taskmanager.numberOfTaskSlots: 8\n");

    let list = service
        .list_logical_clusters(ALIAS, &ClusterFilter::in_namespace(NS))
        .await
        .unwrap();
    assert_eq!(
        list.items[0].flink_configuration,
        BTreeMap::from([("taskmanager.numberOfTaskSlots".to_string(), "8".to_string())])
    );
}

#[tokio::test]
async fn test_empty_apply_is_noop() {
    let fake = FakeGateway::new();
    let service = service_for(&fake);

    service
        .apply_logical_cluster(ALIAS, NS, "demo", &ApplyClusterRequest::default())
        .await
        .unwrap();
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn test_apply_to_missing_cluster() {
    let fake = FakeGateway::new();
    let service = service_for(&fake);

    let update = ApplyClusterRequest {
        labels: Some(BTreeMap::from([("team".to_string(), "data".to_string())])),
        ..Default::default()
    };
    let err = service
        .apply_logical_cluster(ALIAS, NS, "ghost", &update)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.kind(), Some(ResourceKind::JobManagerDeployment));
}

#[tokio::test]
async fn test_apply_cannot_move_correlation_labels() {
    let fake = FakeGateway::new();
    let service = service_for(&fake);
    service
        .create_logical_cluster(ALIAS, &demo_request())
        .await
        .unwrap();
    fake.clear_calls();

    for key in ["app", "component", "owner"] {
        let update = ApplyClusterRequest {
            labels: Some(BTreeMap::from([(key.to_string(), "other".to_string())])),
            ..Default::default()
        };
        let err = service
            .apply_logical_cluster(ALIAS, NS, "demo", &update)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "{key}: {err}");
    }
    assert!(fake.calls().is_empty());

    let list = service
        .list_logical_clusters(ALIAS, &ClusterFilter::in_namespace(NS).owner("bob").name("demo"))
        .await
        .unwrap();
    assert_eq!(list.total, 1);
}

#[tokio::test]
async fn test_apply_rejects_multiline_configuration() {
    let fake = FakeGateway::new();
    let service = service_for(&fake);
    service
        .create_logical_cluster(ALIAS, &demo_request())
        .await
        .unwrap();
    fake.clear_calls();

    let update = ApplyClusterRequest {
        flink_configuration: Some(BTreeMap::from([(
            "state.backend".to_string(),
            "rocksdb\njobmanager.rpc.address: elsewhere".to_string(),
        )])),
        ..Default::default()
    };
    let err = service
        .apply_logical_cluster(ALIAS, NS, "demo", &update)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(fake.calls().is_empty());

    let list = service
        .list_logical_clusters(ALIAS, &ClusterFilter::in_namespace(NS))
        .await
        .unwrap();
    assert_eq!(
        list.items[0].flink_configuration["jobmanager.rpc.address"],
        "demo-jobmanager-service"
    );
}

#[tokio::test]
async fn test_create_rejects_multiline_configuration() {
    let fake = FakeGateway::new();
    let service = service_for(&fake);
    let request = CreateClusterRequestBuilder::new("demo")
        .namespace(NS)
        .flink_conf("state.backend", "rocksdb\njobmanager.rpc.address: elsewhere")
        .build();

    let err = service
        .create_logical_cluster(ALIAS, &request)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(fake.calls().is_empty());
}

// ============================================================
// Delete
// ============================================================

fn ha_config_map(name: &str, app: &str) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(NS.to_string()),
            labels: Some(BTreeMap::from([
                ("app".to_string(), app.to_string()),
                ("configmap-type".to_string(), "high-availability".to_string()),
                ("type".to_string(), "flink-native-kubernetes".to_string()),
            ])),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn test_delete_removes_ha_config_maps() {
    let fake = FakeGateway::new();
    let service = service_for(&fake);
    service
        .create_logical_cluster(ALIAS, &demo_request())
        .await
        .unwrap();
    fake.insert_config_map(ha_config_map("demo-dispatcher-leader", "demo"));
    fake.insert_config_map(ha_config_map("demo-resourcemanager-leader", "demo"));
    fake.insert_config_map(ha_config_map("other-dispatcher-leader", "other"));

    service
        .delete_logical_cluster(ALIAS, &DeleteClusterRequest::new(NS, "demo"))
        .await
        .unwrap();

    assert!(fake.config_map(NS, "demo-dispatcher-leader").is_none());
    assert!(fake.config_map(NS, "demo-resourcemanager-leader").is_none());
    assert!(fake.config_map(NS, "other-dispatcher-leader").is_some());
    assert_eq!(fake.object_count(), 1);
}

#[tokio::test]
async fn test_delete_order() {
    let fake = FakeGateway::new();
    let service = service_for(&fake);
    service
        .create_logical_cluster(ALIAS, &demo_request())
        .await
        .unwrap();
    fake.clear_calls();

    service
        .delete_logical_cluster(ALIAS, &DeleteClusterRequest::new(NS, "demo"))
        .await
        .unwrap();

    let deletes: Vec<_> = fake
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("delete"))
        .collect();
    assert_eq!(
        deletes,
        vec![
            "delete jobmanager-deployment default/demo-jobmanager",
            "delete taskmanager-deployment default/demo-taskmanager",
            "delete configmap default/demo-configmap",
            "delete service default/demo-jobmanager-service",
            "delete lb-service default/demo-jobmanager-lb-service",
            "delete pvc default/demo-pvc",
        ]
    );
}

#[tokio::test]
async fn test_delete_stops_on_error() {
    let fake = FakeGateway::new();
    let service = service_for(&fake);
    service
        .create_logical_cluster(ALIAS, &demo_request())
        .await
        .unwrap();
    fake.fail(ResourceKind::Service, Op::Delete);

    let err = service
        .delete_logical_cluster(ALIAS, &DeleteClusterRequest::new(NS, "demo"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ResourceKind::Service));
    assert!(fake.deployment(NS, "demo-jobmanager").is_none());
    assert!(fake.pvc(NS, "demo-pvc").is_some());

    // Retrying once the API recovers finishes the job
    fake.clear_failures();
    service
        .delete_logical_cluster(ALIAS, &DeleteClusterRequest::new(NS, "demo"))
        .await
        .unwrap();
    assert_eq!(fake.object_count(), 0);
}

#[tokio::test]
async fn test_delete_of_half_created_cluster() {
    let fake = FakeGateway::new();
    fake.fail(ResourceKind::TaskManagerDeployment, Op::Create);
    let service = service_for(&fake);
    assert!(
        service
            .create_logical_cluster(ALIAS, &demo_request())
            .await
            .is_err()
    );
    fake.clear_failures();

    service
        .delete_logical_cluster(ALIAS, &DeleteClusterRequest::new(NS, "demo"))
        .await
        .unwrap();
    assert_eq!(fake.object_count(), 0);
}

// ============================================================
// Scale and restart
// ============================================================

#[tokio::test]
async fn test_scale_task_managers() {
    let fake = FakeGateway::new();
    let service = service_for(&fake);
    service
        .create_logical_cluster(ALIAS, &demo_request())
        .await
        .unwrap();

    service
        .scale_task_managers(ALIAS, NS, "demo", 7)
        .await
        .unwrap();
    let tm = fake.deployment(NS, "demo-taskmanager").unwrap();
    assert_eq!(tm.spec.unwrap().replicas, Some(7));

    fake.clear_calls();
    let err = service
        .scale_task_managers(ALIAS, NS, "demo", -1)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn test_restart_all_touches_task_managers_first() {
    let fake = FakeGateway::new();
    let service = service_for(&fake);
    service
        .create_logical_cluster(ALIAS, &demo_request())
        .await
        .unwrap();
    fake.clear_calls();

    service
        .restart(ALIAS, NS, "demo", RestartTarget::All)
        .await
        .unwrap();

    assert_eq!(
        fake.calls(),
        vec![
            "patch taskmanager-deployment default/demo-taskmanager",
            "patch jobmanager-deployment default/demo-jobmanager",
        ]
    );
    assert!(restart_annotation(&fake, "demo-taskmanager").is_some());
    assert!(restart_annotation(&fake, "demo-jobmanager").is_some());
}

#[tokio::test]
async fn test_restart_single_role() {
    let fake = FakeGateway::new();
    let service = service_for(&fake);
    service
        .create_logical_cluster(ALIAS, &demo_request())
        .await
        .unwrap();

    service
        .restart(ALIAS, NS, "demo", RestartTarget::JobManager)
        .await
        .unwrap();
    assert!(restart_annotation(&fake, "demo-jobmanager").is_some());
    assert!(restart_annotation(&fake, "demo-taskmanager").is_none());
}

// ============================================================
// Metrics
// ============================================================

#[tokio::test]
async fn test_operations_are_counted() {
    let fake = FakeGateway::new();
    let health = Arc::new(HealthState::new());
    let service = service_for(&fake).with_health(health.clone());

    service
        .create_logical_cluster(ALIAS, &demo_request())
        .await
        .unwrap();
    let _ = service
        .create_logical_cluster("prod", &demo_request())
        .await;

    let encoded = health.metrics.encode();
    assert!(encoded.contains("flink_manager_operations_total{alias=\"test\",operation=\"create\"} 1"));
    assert!(
        encoded.contains(
            "flink_manager_operation_errors_total{alias=\"prod\",operation=\"create\"} 1"
        )
    );
    assert!(encoded.contains("flink_manager_registered_clusters 1"));
}
