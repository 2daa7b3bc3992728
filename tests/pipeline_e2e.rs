use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use envconfig::Envconfig;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Service};
use kube::core::ErrorResponse;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use app_provisioner::cluster::{ClusterError, ClusterFactory, ClusterOps};
use app_provisioner::config::ProvisionerConfig;
use app_provisioner::context::RunContext;
use app_provisioner::error::ProvisionError;
use app_provisioner::pipeline;

const ASSIGNED_IP: &str = "10.96.0.17";

fn api_err(code: u16, message: &str) -> ClusterError {
    ClusterError::Api(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: message.to_string(),
        reason: String::new(),
        code,
    }))
}

/// In-memory stand-in for the cluster API. Mimics the server-side rules the
/// reconcilers depend on: duplicate creates conflict, replaces require the
/// live resourceVersion, and a service's clusterIP may not change once set.
#[derive(Default)]
struct FakeCluster {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    namespaces: HashMap<String, Namespace>,
    deployments: HashMap<String, Deployment>,
    services: HashMap<String, Service>,
    creates: usize,
    updates: usize,
}

impl FakeCluster {
    fn creates(&self) -> usize {
        self.state.lock().unwrap().creates
    }
    fn updates(&self) -> usize {
        self.state.lock().unwrap().updates
    }
    fn deployment(&self, name: &str) -> Option<Deployment> {
        self.state.lock().unwrap().deployments.get(name).cloned()
    }
    fn service(&self, name: &str) -> Option<Service> {
        self.state.lock().unwrap().services.get(name).cloned()
    }
    fn namespace(&self, name: &str) -> Option<Namespace> {
        self.state.lock().unwrap().namespaces.get(name).cloned()
    }
    /// Out-of-band edit, as another controller or a human would make.
    fn tamper_deployment(&self, name: &str, f: impl FnOnce(&mut Deployment)) {
        let mut state = self.state.lock().unwrap();
        f(state.deployments.get_mut(name).expect("deployment exists"));
    }
}

fn bump_rv(rv: &mut Option<String>) {
    let next = rv
        .as_deref()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0)
        + 1;
    *rv = Some(next.to_string());
}

#[async_trait]
impl ClusterOps for FakeCluster {
    async fn get_namespace(
        &self,
        name: &str,
    ) -> Result<Option<Namespace>, ClusterError> {
        Ok(self.state.lock().unwrap().namespaces.get(name).cloned())
    }

    async fn create_namespace(
        &self,
        namespace: &Namespace,
    ) -> Result<Namespace, ClusterError> {
        let name = namespace.metadata.name.clone().unwrap();
        let mut state = self.state.lock().unwrap();
        if state.namespaces.contains_key(&name) {
            return Err(api_err(409, "namespaces already exists"));
        }
        state.namespaces.insert(name, namespace.clone());
        state.creates += 1;
        Ok(namespace.clone())
    }

    async fn get_deployment(
        &self,
        _namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, ClusterError> {
        Ok(self.state.lock().unwrap().deployments.get(name).cloned())
    }

    async fn create_deployment(
        &self,
        _namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, ClusterError> {
        let name = deployment.metadata.name.clone().unwrap();
        let mut state = self.state.lock().unwrap();
        if state.deployments.contains_key(&name) {
            return Err(api_err(409, "deployments already exists"));
        }
        let mut stored = deployment.clone();
        stored.metadata.resource_version = Some("1".to_string());
        state.deployments.insert(name, stored.clone());
        state.creates += 1;
        Ok(stored)
    }

    async fn replace_deployment(
        &self,
        _namespace: &str,
        name: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, ClusterError> {
        let mut state = self.state.lock().unwrap();
        let live = state
            .deployments
            .get(name)
            .ok_or_else(|| api_err(404, "deployments not found"))?;
        if deployment.metadata.resource_version
            != live.metadata.resource_version
        {
            return Err(api_err(409, "resourceVersion conflict"));
        }
        let mut stored = deployment.clone();
        bump_rv(&mut stored.metadata.resource_version);
        state.deployments.insert(name.to_string(), stored.clone());
        state.updates += 1;
        Ok(stored)
    }

    async fn get_service(
        &self,
        _namespace: &str,
        name: &str,
    ) -> Result<Option<Service>, ClusterError> {
        Ok(self.state.lock().unwrap().services.get(name).cloned())
    }

    async fn create_service(
        &self,
        _namespace: &str,
        service: &Service,
    ) -> Result<Service, ClusterError> {
        let name = service.metadata.name.clone().unwrap();
        let mut state = self.state.lock().unwrap();
        if state.services.contains_key(&name) {
            return Err(api_err(409, "services already exists"));
        }
        let mut stored = service.clone();
        stored.metadata.resource_version = Some("1".to_string());
        if let Some(spec) = stored.spec.as_mut() {
            spec.cluster_ip = Some(ASSIGNED_IP.to_string());
        }
        state.services.insert(name, stored.clone());
        state.creates += 1;
        Ok(stored)
    }

    async fn replace_service(
        &self,
        _namespace: &str,
        name: &str,
        service: &Service,
    ) -> Result<Service, ClusterError> {
        let mut state = self.state.lock().unwrap();
        let live = state
            .services
            .get(name)
            .ok_or_else(|| api_err(404, "services not found"))?;
        if service.metadata.resource_version != live.metadata.resource_version
        {
            return Err(api_err(409, "resourceVersion conflict"));
        }
        let live_ip =
            live.spec.as_ref().and_then(|s| s.cluster_ip.clone());
        let sent_ip = service
            .spec
            .as_ref()
            .and_then(|s| s.cluster_ip.clone());
        if sent_ip != live_ip {
            return Err(api_err(
                422,
                "spec.clusterIP: Invalid value: may not change once set",
            ));
        }
        let mut stored = service.clone();
        bump_rv(&mut stored.metadata.resource_version);
        state.services.insert(name.to_string(), stored.clone());
        state.updates += 1;
        Ok(stored)
    }
}

/// Factory double: verifies the credential handoff happened (rewritten
/// kubeconfig on disk) and hands back the shared in-memory cluster.
struct FakeFactory {
    cluster: Arc<FakeCluster>,
    expected_alias: &'static str,
}

#[async_trait]
impl ClusterFactory for FakeFactory {
    async fn connect(
        &self,
        kubeconfig: &Path,
    ) -> Result<Arc<dyn ClusterOps>, ClusterError> {
        let conf = std::fs::read_to_string(kubeconfig)
            .map_err(|e| ClusterError::Config(e.to_string()))?;
        assert!(
            conf.contains(self.expected_alias),
            "credential should be rewritten before client construction"
        );
        assert!(!conf.contains("localhost"));
        Ok(self.cluster.clone())
    }
}

async fn mount_backend(server: &MockServer) {
    let conf_b64 = STANDARD.encode("server: https://localhost:6443");
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/kube-conf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            serde_json::json!({ "data": { "data": { "conf": conf_b64 } } }),
        ))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/nginx"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            serde_json::json!({ "data": { "data": { "version": "1.2.3" } } }),
        ))
        .mount(server)
        .await;
}

fn test_config(
    server: &MockServer,
    dir: &tempfile::TempDir,
    replicas: &str,
) -> ProvisionerConfig {
    let mut env = HashMap::new();
    env.insert(
        "PROVISIONER_VAULT_ADDRESS".to_string(),
        server.uri(),
    );
    env.insert(
        "PROVISIONER_KUBE_CONF_FILE".to_string(),
        dir.path().join("kube-conf").display().to_string(),
    );
    env.insert(
        "PROVISIONER_APP_VERSION_FILE".to_string(),
        dir.path().join("app-version").display().to_string(),
    );
    env.insert("PROVISIONER_REPLICAS".to_string(), replicas.to_string());
    ProvisionerConfig::init_from_hashmap(&env).unwrap()
}

#[tokio::test]
async fn scenario_a_single_run_provisions_everything() {
    let server = MockServer::start().await;
    mount_backend(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let cluster = Arc::new(FakeCluster::default());

    let plan = pipeline::standard(Arc::new(FakeFactory {
        cluster: cluster.clone(),
        expected_alias: "host.docker.internal",
    }))
    .unwrap();
    assert_eq!(
        plan.titles(),
        vec![
            "fetch-secrets",
            "populate-config",
            "ensure-namespace",
            "ensure-deployment",
            "ensure-service",
        ]
    );

    let mut ctx = RunContext::new(test_config(&server, &dir, "2"));
    plan.run(&mut ctx).await.unwrap();

    assert!(cluster.namespace("nginx").is_some());

    let dep = cluster.deployment("nginx").unwrap();
    let spec = dep.spec.unwrap();
    assert_eq!(spec.replicas, Some(2));
    let pod = spec.template.spec.unwrap();
    assert_eq!(pod.containers[0].image.as_deref(), Some("nginx:1.2.3"));

    let svc = cluster.service("nginx").unwrap();
    let spec = svc.spec.unwrap();
    assert_eq!(spec.type_.as_deref(), Some("NodePort"));
    let ports = spec.ports.unwrap();
    let port = &ports[0];
    assert_eq!(port.port, 8090);
    assert_eq!(
        port.target_port,
        Some(k8s_openapi::apimachinery::pkg::util::intstr::IntOrString::Int(
            80
        ))
    );
    assert_eq!(spec.cluster_ip.as_deref(), Some(ASSIGNED_IP));

    assert_eq!(cluster.creates(), 3);
    assert_eq!(cluster.updates(), 0);
}

#[tokio::test]
async fn scenario_b_second_run_updates_instead_of_creating() {
    let server = MockServer::start().await;
    mount_backend(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let cluster = Arc::new(FakeCluster::default());
    let plan = pipeline::standard(Arc::new(FakeFactory {
        cluster: cluster.clone(),
        expected_alias: "host.docker.internal",
    }))
    .unwrap();
    let cfg = test_config(&server, &dir, "2");

    let mut ctx = RunContext::new(cfg.clone());
    plan.run(&mut ctx).await.unwrap();
    assert_eq!(cluster.creates(), 3);

    // Out-of-band drift: another actor scales the deployment.
    cluster.tamper_deployment("nginx", |dep| {
        if let Some(spec) = dep.spec.as_mut() {
            spec.replicas = Some(7);
        }
    });

    let mut ctx = RunContext::new(cfg);
    plan.run(&mut ctx).await.unwrap();

    // Second run resolves through the found branches only: no new creates,
    // one update each for deployment and service, namespace untouched.
    assert_eq!(cluster.creates(), 3);
    assert_eq!(cluster.updates(), 2);

    // Full-replace semantics: the drifted replica count is clobbered back.
    let dep = cluster.deployment("nginx").unwrap();
    assert_eq!(dep.spec.unwrap().replicas, Some(2));

    // Identity preserved across the service update.
    let svc = cluster.service("nginx").unwrap();
    assert_eq!(
        svc.spec.unwrap().cluster_ip.as_deref(),
        Some(ASSIGNED_IP)
    );
}

#[tokio::test]
async fn malformed_replica_count_halts_before_any_cluster_call() {
    let server = MockServer::start().await;
    mount_backend(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let cluster = Arc::new(FakeCluster::default());
    let plan = pipeline::standard(Arc::new(FakeFactory {
        cluster: cluster.clone(),
        expected_alias: "host.docker.internal",
    }))
    .unwrap();

    let mut ctx = RunContext::new(test_config(&server, &dir, "abc"));
    let err = plan.run(&mut ctx).await.unwrap_err();
    assert!(matches!(
        err,
        ProvisionError::Parse { key: "replicas", .. }
    ));

    assert_eq!(cluster.creates(), 0);
    assert_eq!(cluster.updates(), 0);
    assert!(cluster.namespace("nginx").is_none());
}

#[tokio::test]
async fn backend_outage_halts_the_first_step() {
    let server = MockServer::start().await;
    // No mocks mounted: every read returns 404 from the mock server.
    let dir = tempfile::tempdir().unwrap();
    let cluster = Arc::new(FakeCluster::default());
    let plan = pipeline::standard(Arc::new(FakeFactory {
        cluster: cluster.clone(),
        expected_alias: "host.docker.internal",
    }))
    .unwrap();

    let mut ctx = RunContext::new(test_config(&server, &dir, "2"));
    let err = plan.run(&mut ctx).await.unwrap_err();
    assert!(matches!(err, ProvisionError::BackendRead { .. }));
    assert_eq!(cluster.creates(), 0);
}
