use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::info;

use super::{lookup_failed, mutation_failed};
use crate::cluster::ClusterOps;
use crate::context::AppDescriptor;
use crate::error::ProvisionError;

/// Builds the namespace object: just the name, nothing else. A pre-existing
/// namespace is never modified, whatever labels or spec it carries.
pub fn desired_namespace(app: &AppDescriptor) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(app.name.clone()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Idempotent ensure-exists keyed by the app name. Only a typed "absent"
/// result proceeds to create; transport or permission failures during the
/// lookup abort the step instead of masquerading as "not found".
pub async fn ensure_namespace(
    cluster: &dyn ClusterOps,
    app: &AppDescriptor,
) -> Result<(), ProvisionError> {
    let existing = cluster
        .get_namespace(&app.name)
        .await
        .map_err(|e| lookup_failed("Namespace", &app.name, e))?;

    match existing {
        Some(_) => {
            info!(namespace = %app.name, "namespace already exists; skipping");
        }
        None => {
            cluster
                .create_namespace(&desired_namespace(app))
                .await
                .map_err(|e| mutation_failed("Namespace", &app.name, e))?;
            info!(namespace = %app.name, "namespace created");
        }
    }
    Ok(())
}
