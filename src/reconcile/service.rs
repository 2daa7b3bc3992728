use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use tracing::info;

use super::{
    CONTAINER_PORT, SERVICE_PORT, app_labels, lookup_failed, mutation_failed,
};
use crate::cluster::ClusterOps;
use crate::context::AppDescriptor;
use crate::error::ProvisionError;

/// Builds the desired service: NodePort exposure, one TCP port mapping onto
/// the app container port, pods selected by the app label.
pub fn desired_service(app: &AppDescriptor) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(app.name.clone()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(app_labels(&app.name)),
            type_: Some("NodePort".to_string()),
            ports: Some(vec![ServicePort {
                protocol: Some("TCP".to_string()),
                port: SERVICE_PORT,
                target_port: Some(IntOrString::Int(CONTAINER_PORT)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Idempotent upsert with identity preservation. On update, the existing
/// object's metadata and its cluster-assigned virtual IP are carried into
/// the replacement; the API rejects any replace that drops either, since a
/// service's clusterIP may not change once assigned.
pub async fn ensure_service(
    cluster: &dyn ClusterOps,
    app: &AppDescriptor,
) -> Result<(), ProvisionError> {
    let mut desired = desired_service(app);
    let existing = cluster
        .get_service(&app.name, &app.name)
        .await
        .map_err(|e| lookup_failed("Service", &app.name, e))?;

    match existing {
        Some(current) => {
            desired.metadata = current.metadata.clone();
            if let (Some(spec), Some(live)) =
                (desired.spec.as_mut(), current.spec.as_ref())
            {
                spec.cluster_ip = live.cluster_ip.clone();
            }
            cluster
                .replace_service(&app.name, &app.name, &desired)
                .await
                .map_err(|e| mutation_failed("Service", &app.name, e))?;
            info!(service = %app.name, "service updated");
        }
        None => {
            cluster
                .create_service(&app.name, &desired)
                .await
                .map_err(|e| mutation_failed("Service", &app.name, e))?;
            info!(service = %app.name, "service created");
        }
    }
    Ok(())
}
