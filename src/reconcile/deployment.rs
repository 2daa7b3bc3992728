use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, PodSpec, PodTemplateSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{
    LabelSelector, ObjectMeta,
};
use tracing::info;

use super::{CONTAINER_PORT, app_labels, lookup_failed, mutation_failed};
use crate::cluster::ClusterOps;
use crate::context::AppDescriptor;
use crate::error::ProvisionError;

/// Builds the complete desired deployment: one container named after the
/// app, always-pull policy, one exposed port. This is the whole managed
/// surface; an update replaces the live spec with exactly this.
pub fn desired_deployment(app: &AppDescriptor) -> Deployment {
    let labels = app_labels(&app.name);
    Deployment {
        metadata: ObjectMeta {
            name: Some(app.name.clone()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(app.replicas),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: app.name.clone(),
                        image: Some(app.image.clone()),
                        image_pull_policy: Some("Always".to_string()),
                        ports: Some(vec![ContainerPort {
                            container_port: CONTAINER_PORT,
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Idempotent upsert. When the deployment exists it is replaced wholesale
/// with the freshly built desired object; out-of-band edits to managed
/// fields do not survive. Only the live resourceVersion is carried over,
/// because the API demands it on a full replace.
pub async fn ensure_deployment(
    cluster: &dyn ClusterOps,
    app: &AppDescriptor,
) -> Result<(), ProvisionError> {
    let mut desired = desired_deployment(app);
    let existing = cluster
        .get_deployment(&app.name, &app.name)
        .await
        .map_err(|e| lookup_failed("Deployment", &app.name, e))?;

    match existing {
        Some(current) => {
            desired.metadata.resource_version =
                current.metadata.resource_version.clone();
            cluster
                .replace_deployment(&app.name, &app.name, &desired)
                .await
                .map_err(|e| mutation_failed("Deployment", &app.name, e))?;
            info!(
                deployment = %app.name,
                image = %app.image,
                replicas = app.replicas,
                "deployment updated"
            );
        }
        None => {
            cluster
                .create_deployment(&app.name, &desired)
                .await
                .map_err(|e| mutation_failed("Deployment", &app.name, e))?;
            info!(
                deployment = %app.name,
                image = %app.image,
                replicas = app.replicas,
                "deployment created"
            );
        }
    }
    Ok(())
}
