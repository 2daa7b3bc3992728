use crate::cluster::ClusterError;

/// Failure kinds a provisioning run can surface. Every variant is logged
/// where it occurs and propagated unchanged up to the pipeline runner; no
/// step retries and no step rolls back work already committed.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("secrets backend read at '{path}' failed: {reason}")]
    BackendRead { path: String, reason: String },

    #[error("secret payload decode failed: {0}")]
    Decode(String),

    #[error("invalid value '{value}' for parameter '{key}': {reason}")]
    Parse {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("cannot construct cluster client: {0}")]
    ClientConstruction(String),

    #[error("lookup of {kind} '{name}' failed: {source}")]
    Lookup {
        kind: &'static str,
        name: String,
        #[source]
        source: ClusterError,
    },

    #[error("create/update of {kind} '{name}' failed: {source}")]
    Mutation {
        kind: &'static str,
        name: String,
        #[source]
        source: ClusterError,
    },

    /// Handoff-file I/O between pipeline stages.
    #[error("handoff file I/O failed: {0}")]
    Persist(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}
