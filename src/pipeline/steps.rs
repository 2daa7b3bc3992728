use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::Step;
use crate::cluster::ClusterFactory;
use crate::context::{AppDescriptor, RunContext, parse_replicas};
use crate::error::ProvisionError;
use crate::reconcile;
use crate::secrets::SecretResolver;

/// Fetches the cluster credential and app version from the secrets backend
/// and persists both to the handoff files.
pub struct FetchSecrets;

#[async_trait]
impl Step for FetchSecrets {
    fn title(&self) -> &'static str {
        "fetch-secrets"
    }
    fn description(&self) -> &'static str {
        "Fetch the cluster credential and application version from the secrets backend"
    }
    async fn run(&self, ctx: &mut RunContext) -> Result<(), ProvisionError> {
        SecretResolver::from_config(&ctx.cfg)?.fetch_and_store().await
    }
}

/// Assembles the immutable application descriptor and builds the cluster
/// client from the persisted credential.
pub struct PopulateConfig {
    factory: Arc<dyn ClusterFactory>,
}

impl PopulateConfig {
    pub fn new(factory: Arc<dyn ClusterFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl Step for PopulateConfig {
    fn title(&self) -> &'static str {
        "populate-config"
    }
    fn description(&self) -> &'static str {
        "Resolve the application descriptor and construct the cluster client"
    }
    fn depends_on(&self) -> &'static [&'static str] {
        &["fetch-secrets"]
    }
    async fn run(&self, ctx: &mut RunContext) -> Result<(), ProvisionError> {
        let replicas = parse_replicas(&ctx.cfg.replicas)?;

        // An explicit image reference wins; otherwise the tag comes from the
        // backend-resolved version written by the previous step.
        let image = match ctx.cfg.image.as_deref() {
            Some(image) if !image.is_empty() => image.to_string(),
            _ => {
                let version =
                    tokio::fs::read_to_string(&ctx.cfg.app_version_file)
                        .await?;
                format!("{}:{}", ctx.cfg.app_name, version.trim())
            }
        };

        let descriptor = AppDescriptor {
            name: ctx.cfg.app_name.clone(),
            image,
            replicas,
        };
        let cluster = self
            .factory
            .connect(Path::new(&ctx.cfg.kube_conf_file))
            .await
            .map_err(|e| ProvisionError::ClientConstruction(e.to_string()))?;

        info!(
            app = %descriptor.name,
            image = %descriptor.image,
            replicas = descriptor.replicas,
            "run configuration populated"
        );
        ctx.install(descriptor, cluster);
        Ok(())
    }
}

pub struct EnsureNamespace;

#[async_trait]
impl Step for EnsureNamespace {
    fn title(&self) -> &'static str {
        "ensure-namespace"
    }
    fn description(&self) -> &'static str {
        "Create the application namespace if it does not exist"
    }
    fn depends_on(&self) -> &'static [&'static str] {
        &["populate-config"]
    }
    async fn run(&self, ctx: &mut RunContext) -> Result<(), ProvisionError> {
        let run = ctx.resolved()?;
        reconcile::namespace::ensure_namespace(
            run.cluster.as_ref(),
            &run.descriptor,
        )
        .await
    }
}

pub struct EnsureDeployment;

#[async_trait]
impl Step for EnsureDeployment {
    fn title(&self) -> &'static str {
        "ensure-deployment"
    }
    fn description(&self) -> &'static str {
        "Create or update the application deployment"
    }
    fn depends_on(&self) -> &'static [&'static str] {
        &["ensure-namespace"]
    }
    async fn run(&self, ctx: &mut RunContext) -> Result<(), ProvisionError> {
        let run = ctx.resolved()?;
        reconcile::deployment::ensure_deployment(
            run.cluster.as_ref(),
            &run.descriptor,
        )
        .await
    }
}

pub struct EnsureService;

#[async_trait]
impl Step for EnsureService {
    fn title(&self) -> &'static str {
        "ensure-service"
    }
    fn description(&self) -> &'static str {
        "Create or update the service exposing the application"
    }
    fn depends_on(&self) -> &'static [&'static str] {
        &["ensure-deployment"]
    }
    async fn run(&self, ctx: &mut RunContext) -> Result<(), ProvisionError> {
        let run = ctx.resolved()?;
        reconcile::service::ensure_service(
            run.cluster.as_ref(),
            &run.descriptor,
        )
        .await
    }
}
