use std::sync::Arc;

use app_provisioner::{
    cluster::KubeClusterFactory, config::ProvisionerConfig,
    context::RunContext, init_tracing, pipeline,
};
use envconfig::Envconfig;
use tracing::info;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing("info");

    // Ensure rustls uses the aws-lc-rs provider explicitly.
    // This avoids runtime errors when no default provider is set.
    if let Err(e) = rustls::crypto::CryptoProvider::install_default(
        rustls::crypto::aws_lc_rs::default_provider(),
    ) {
        tracing::debug!(
            ?e,
            "CryptoProvider already installed or incompatible; proceeding"
        );
    }

    let cfg = ProvisionerConfig::init_from_env()?;
    info!(
        app = %cfg.app_name,
        backend = %cfg.vault_address,
        "starting provisioning run"
    );

    let plan = pipeline::standard(Arc::new(KubeClusterFactory))?;
    let mut ctx = RunContext::new(cfg);
    plan.run(&mut ctx).await?;

    info!("provisioning run complete");
    Ok(())
}
