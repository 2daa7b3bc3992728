use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Service};
use kube::api::{Api, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error(transparent)]
    Api(#[from] kube::Error),

    #[error("kubeconfig error: {0}")]
    Config(String),
}

/// Typed access to the three resource kinds this system reconciles.
///
/// The `get_*` methods return `Ok(None)` only for a genuine HTTP 404; any
/// other lookup failure (transport, permission) surfaces as an error so the
/// caller never mistakes it for "resource absent" and blindly creates.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterOps: Send + Sync {
    async fn get_namespace(
        &self,
        name: &str,
    ) -> Result<Option<Namespace>, ClusterError>;

    async fn create_namespace(
        &self,
        namespace: &Namespace,
    ) -> Result<Namespace, ClusterError>;

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, ClusterError>;

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, ClusterError>;

    /// Full replace of the live object; not a merge patch.
    async fn replace_deployment(
        &self,
        namespace: &str,
        name: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, ClusterError>;

    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Service>, ClusterError>;

    async fn create_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> Result<Service, ClusterError>;

    /// Full replace; the caller must carry over identity metadata and the
    /// cluster-assigned virtual IP or the API rejects the call.
    async fn replace_service(
        &self,
        namespace: &str,
        name: &str,
        service: &Service,
    ) -> Result<Service, ClusterError>;
}

/// Builds a cluster handle from the credential persisted by the secrets
/// stage. A seam so tests can substitute an in-memory cluster.
#[async_trait]
pub trait ClusterFactory: Send + Sync {
    async fn connect(
        &self,
        kubeconfig: &Path,
    ) -> Result<Arc<dyn ClusterOps>, ClusterError>;
}

pub struct KubeClusterFactory;

#[async_trait]
impl ClusterFactory for KubeClusterFactory {
    async fn connect(
        &self,
        kubeconfig: &Path,
    ) -> Result<Arc<dyn ClusterOps>, ClusterError> {
        let kc = Kubeconfig::read_from(kubeconfig).map_err(|e| {
            ClusterError::Config(format!("failed to read kubeconfig: {e}"))
        })?;
        let config =
            Config::from_custom_kubeconfig(kc, &KubeConfigOptions::default())
                .await
                .map_err(|e| {
                    ClusterError::Config(format!(
                        "failed to build client config: {e}"
                    ))
                })?;
        debug!(server = %config.cluster_url, "cluster client config built");
        let client = Client::try_from(config).map_err(|e| {
            ClusterError::Config(format!("failed to create client: {e}"))
        })?;
        Ok(Arc::new(KubeCluster::new(client)))
    }
}

/// Real implementation over the Kubernetes API.
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn found_or_absent<T>(
    res: Result<T, kube::Error>,
) -> Result<Option<T>, ClusterError> {
    match res {
        Ok(obj) => Ok(Some(obj)),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl ClusterOps for KubeCluster {
    async fn get_namespace(
        &self,
        name: &str,
    ) -> Result<Option<Namespace>, ClusterError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        found_or_absent(api.get(name).await)
    }

    async fn create_namespace(
        &self,
        namespace: &Namespace,
    ) -> Result<Namespace, ClusterError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        Ok(api.create(&PostParams::default(), namespace).await?)
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, ClusterError> {
        let api: Api<Deployment> =
            Api::namespaced(self.client.clone(), namespace);
        found_or_absent(api.get(name).await)
    }

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, ClusterError> {
        let api: Api<Deployment> =
            Api::namespaced(self.client.clone(), namespace);
        Ok(api.create(&PostParams::default(), deployment).await?)
    }

    async fn replace_deployment(
        &self,
        namespace: &str,
        name: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, ClusterError> {
        let api: Api<Deployment> =
            Api::namespaced(self.client.clone(), namespace);
        Ok(api.replace(name, &PostParams::default(), deployment).await?)
    }

    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Service>, ClusterError> {
        let api: Api<Service> =
            Api::namespaced(self.client.clone(), namespace);
        found_or_absent(api.get(name).await)
    }

    async fn create_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> Result<Service, ClusterError> {
        let api: Api<Service> =
            Api::namespaced(self.client.clone(), namespace);
        Ok(api.create(&PostParams::default(), service).await?)
    }

    async fn replace_service(
        &self,
        namespace: &str,
        name: &str,
        service: &Service,
    ) -> Result<Service, ClusterError> {
        let api: Api<Service> =
            Api::namespaced(self.client.clone(), namespace);
        Ok(api.replace(name, &PostParams::default(), service).await?)
    }
}
