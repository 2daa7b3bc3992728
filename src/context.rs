use std::sync::Arc;

use crate::cluster::ClusterOps;
use crate::config::ProvisionerConfig;
use crate::error::ProvisionError;

/// What gets deployed: resolved once during config population, immutable for
/// the rest of the run. The name doubles as namespace, resource name and
/// label selector value across all three reconcilers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppDescriptor {
    pub name: String,
    pub image: String,
    pub replicas: i32,
}

/// Per-run state threaded through the pipeline steps. Replaces hidden
/// process-wide globals: the populate step installs the resolved app and the
/// cluster handle exactly once, later steps only read.
pub struct RunContext {
    pub cfg: ProvisionerConfig,
    resolved: Option<ResolvedApp>,
}

pub struct ResolvedApp {
    pub descriptor: AppDescriptor,
    pub cluster: Arc<dyn ClusterOps>,
}

impl RunContext {
    pub fn new(cfg: ProvisionerConfig) -> Self {
        Self {
            cfg,
            resolved: None,
        }
    }

    pub fn install(
        &mut self,
        descriptor: AppDescriptor,
        cluster: Arc<dyn ClusterOps>,
    ) {
        self.resolved = Some(ResolvedApp {
            descriptor,
            cluster,
        });
    }

    /// The resolved app and cluster handle. Step ordering guarantees this is
    /// populated before any reconciler runs.
    pub fn resolved(&self) -> Result<&ResolvedApp, ProvisionError> {
        self.resolved.as_ref().ok_or_else(|| {
            ProvisionError::Internal(
                "run configuration accessed before population".to_string(),
            )
        })
    }
}

/// Parses the operator-supplied replica count. No default substitution: a
/// malformed value fails the run before any reconciler is reached.
pub fn parse_replicas(raw: &str) -> Result<i32, ProvisionError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|e| ProvisionError::Parse {
            key: "replicas",
            value: raw.to_string(),
            reason: e.to_string(),
        })
}
