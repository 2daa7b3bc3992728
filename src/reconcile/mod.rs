pub mod deployment;
pub mod namespace;
pub mod service;

use std::collections::BTreeMap;

use tracing::error;

use crate::cluster::ClusterError;
use crate::error::ProvisionError;

/// Port the application container listens on.
pub const CONTAINER_PORT: i32 = 80;
/// Externally exposed service port, mapped onto [`CONTAINER_PORT`].
pub const SERVICE_PORT: i32 = 8090;

pub(crate) fn app_labels(name: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert("app".to_string(), name.to_string());
    labels
}

pub(crate) fn lookup_failed(
    kind: &'static str,
    name: &str,
    source: ClusterError,
) -> ProvisionError {
    error!(kind, %name, error = %source, "cluster lookup failed");
    ProvisionError::Lookup {
        kind,
        name: name.to_string(),
        source,
    }
}

pub(crate) fn mutation_failed(
    kind: &'static str,
    name: &str,
    source: ClusterError,
) -> ProvisionError {
    error!(kind, %name, error = %source, "cluster create/update failed");
    ProvisionError::Mutation {
        kind,
        name: name.to_string(),
        source,
    }
}
