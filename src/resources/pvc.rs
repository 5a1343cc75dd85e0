//! PersistentVolumeClaim for the JobManager upload directory.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    PersistentVolumeClaim, PersistentVolumeClaimSpec, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

use crate::resources::ClusterContext;
use crate::resources::common::{object_meta, standard_labels};

/// Generate the ReadWriteOnce PVC mounted at `/opt/flink/target`.
pub fn generate_pvc(ctx: &ClusterContext<'_>) -> PersistentVolumeClaim {
    let spec = &ctx.request.job_manager;

    PersistentVolumeClaim {
        metadata: object_meta(
            ctx.name.pvc(),
            ctx.namespace(),
            standard_labels(&ctx.name, ctx.owner()),
        ),
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            storage_class_name: spec.storage_class.clone(),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(format!("{}Gi", spec.pvc_size)),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}
