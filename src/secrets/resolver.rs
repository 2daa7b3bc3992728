use std::path::PathBuf;
use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD};
use tokio::fs;
use tracing::info;

use super::VaultClient;
use crate::config::ProvisionerConfig;
use crate::error::ProvisionError;

/// Fetches the cluster credential and the application version from the
/// secrets backend and persists both to the handoff files the config
/// population stage reads.
pub struct SecretResolver {
    vault: VaultClient,
    conf_path: String,
    version_path: String,
    host_alias: String,
    kube_conf_file: PathBuf,
    app_version_file: PathBuf,
}

impl SecretResolver {
    pub fn new(
        vault: VaultClient,
        conf_path: impl Into<String>,
        version_path: impl Into<String>,
        host_alias: impl Into<String>,
        kube_conf_file: impl Into<PathBuf>,
        app_version_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            vault,
            conf_path: conf_path.into(),
            version_path: version_path.into(),
            host_alias: host_alias.into(),
            kube_conf_file: kube_conf_file.into(),
            app_version_file: app_version_file.into(),
        }
    }

    pub fn from_config(
        cfg: &ProvisionerConfig,
    ) -> Result<Self, ProvisionError> {
        let vault = VaultClient::new(
            &cfg.vault_address,
            &cfg.vault_token,
            Duration::from_secs(cfg.vault_timeout_secs),
        )?;
        Ok(Self::new(
            vault,
            cfg.conf_secret_path.clone(),
            cfg.version_secret_path.clone(),
            cfg.host_alias.clone(),
            cfg.kube_conf_file.clone(),
            cfg.app_version_file.clone(),
        ))
    }

    /// Resolves both secrets and writes the handoff files.
    ///
    /// The credential arrives base64-encoded; after decoding, any loopback
    /// server address is rewritten to the configured host alias so the
    /// cluster stays reachable from inside a container. Partial writes are
    /// not cleaned up on failure; the run aborts and the next run overwrites.
    pub async fn fetch_and_store(&self) -> Result<(), ProvisionError> {
        let conf_b64 =
            self.vault.read_field(&self.conf_path, "conf").await?;
        let raw = STANDARD.decode(conf_b64.trim()).map_err(|e| {
            ProvisionError::Decode(format!(
                "credential at '{}' is not valid base64: {e}",
                self.conf_path
            ))
        })?;
        let conf = String::from_utf8(raw).map_err(|e| {
            ProvisionError::Decode(format!(
                "credential at '{}' is not valid UTF-8: {e}",
                self.conf_path
            ))
        })?;
        let conf = rewrite_loopback(&conf, &self.host_alias);
        fs::write(&self.kube_conf_file, conf).await?;
        info!(file = %self.kube_conf_file.display(), "cluster credential persisted");

        let version = self
            .vault
            .read_field(&self.version_path, "version")
            .await?;
        fs::write(&self.app_version_file, &version).await?;
        info!(
            file = %self.app_version_file.display(),
            %version,
            "application version persisted"
        );
        Ok(())
    }
}

/// Rewrites the loopback hostname literal inside a kubeconfig to a
/// host-reachable alias. A single substitution suffices: the literal appears
/// once in the expected `server:` line.
pub fn rewrite_loopback(conf: &str, alias: &str) -> String {
    conf.replacen("localhost", alias, 1)
}
