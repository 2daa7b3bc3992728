use envconfig::Envconfig;

/// Operator-supplied parameters for a provisioning run. Defaults match the
/// values the invoking host presents when nothing is overridden.
#[derive(Envconfig, Clone, Debug)]
pub struct ProvisionerConfig {
    /// Base address of the secrets backend.
    /// Env: PROVISIONER_VAULT_ADDRESS
    #[envconfig(from = "PROVISIONER_VAULT_ADDRESS", default = "http://vault:8200")]
    pub vault_address: String,

    /// Bearer token for the secrets backend.
    /// Env: PROVISIONER_VAULT_TOKEN
    #[envconfig(from = "PROVISIONER_VAULT_TOKEN", default = "root-token")]
    pub vault_token: String,

    /// Logical path of the kubeconfig secret.
    /// Env: PROVISIONER_VAULT_CONF_PATH
    #[envconfig(
        from = "PROVISIONER_VAULT_CONF_PATH",
        default = "secret/data/kube-conf"
    )]
    pub conf_secret_path: String,

    /// Logical path of the application version secret.
    /// Env: PROVISIONER_VAULT_VERSION_PATH
    #[envconfig(
        from = "PROVISIONER_VAULT_VERSION_PATH",
        default = "secret/data/nginx"
    )]
    pub version_secret_path: String,

    /// Application name; also used as the namespace and the label selector
    /// value for every reconciled resource.
    /// Env: PROVISIONER_APP_NAME
    #[envconfig(from = "PROVISIONER_APP_NAME", default = "nginx")]
    pub app_name: String,

    /// Full image reference. When unset, the image is assembled from the app
    /// name and the backend-resolved version.
    /// Env: PROVISIONER_IMAGE
    #[envconfig(from = "PROVISIONER_IMAGE")]
    pub image: Option<String>,

    /// Desired replica count, as the decimal string the host hands over.
    /// Parsed during config population; a malformed value fails the run.
    /// Env: PROVISIONER_REPLICAS
    #[envconfig(from = "PROVISIONER_REPLICAS", default = "2")]
    pub replicas: String,

    /// DNS alias substituted for loopback literals inside the fetched
    /// kubeconfig so the cluster stays reachable from inside a container.
    /// Env: PROVISIONER_HOST_ALIAS
    #[envconfig(
        from = "PROVISIONER_HOST_ALIAS",
        default = "host.docker.internal"
    )]
    pub host_alias: String,

    /// Handoff file for the rewritten kubeconfig.
    /// Env: PROVISIONER_KUBE_CONF_FILE
    #[envconfig(from = "PROVISIONER_KUBE_CONF_FILE", default = "/tmp/kube-conf")]
    pub kube_conf_file: String,

    /// Handoff file for the raw application version string.
    /// Env: PROVISIONER_APP_VERSION_FILE
    #[envconfig(
        from = "PROVISIONER_APP_VERSION_FILE",
        default = "/tmp/app-version"
    )]
    pub app_version_file: String,

    /// Request timeout against the secrets backend, in seconds.
    /// Env: PROVISIONER_VAULT_TIMEOUT_SECS
    #[envconfig(from = "PROVISIONER_VAULT_TIMEOUT_SECS", default = "10")]
    pub vault_timeout_secs: u64,
}
