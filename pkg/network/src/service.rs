use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use pkg_constants::network::SERVICE_ADDR_SUFFIX;
use pkg_types::{Context, Error, Network, Result, ServiceLocator, join_host_port};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::conn::Conn;
use crate::dial::dial;
use crate::kubeconfig::kubeconfig_path;

/// Fetches Service objects from the cluster API.
#[async_trait]
pub trait ServiceLookup: Send + Sync {
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service>;
}

/// Where [`KubeconfigLookup`] finds its kubeconfig.
#[derive(Debug, Clone)]
pub enum KubeconfigSource {
    /// Discover per execution environment, see [`kubeconfig_path`].
    Detect,
    Path(PathBuf),
}

/// [`ServiceLookup`] backed by a client built from a kubeconfig file.
///
/// The client is created on first use; a failed attempt is retried on the
/// next lookup.
pub struct KubeconfigLookup {
    source: KubeconfigSource,
    client: OnceCell<Client>,
}

impl KubeconfigLookup {
    pub fn new(source: KubeconfigSource) -> Self {
        Self {
            source,
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<Client> {
        self.client
            .get_or_try_init(|| async {
                let path = match &self.source {
                    KubeconfigSource::Detect => kubeconfig_path()?,
                    KubeconfigSource::Path(path) => path.clone(),
                };
                client_from_kubeconfig(&path).await
            })
            .await
            .cloned()
    }
}

async fn client_from_kubeconfig(path: &std::path::Path) -> Result<Client> {
    debug!("Loading kubeconfig {}", path.display());
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::from_io(format!("failed to read kubeconfig {}", path.display()), e))?;
    let kubeconfig = Kubeconfig::from_yaml(&content).map_err(|e| {
        Error::config(format!("failed to parse kubeconfig {}", path.display()), e)
    })?;

    pkg_pki::install_crypto_provider();
    let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| Error::config("invalid kubeconfig", e))?;
    Client::try_from(config).map_err(|e| Error::config("failed to create kubernetes client", e))
}

#[async_trait]
impl ServiceLookup for KubeconfigLookup {
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service> {
        let client = self.client().await?;
        let api: Api<Service> = Api::namespaced(client, namespace);
        api.get(name).await.map_err(|e| match e {
            kube::Error::Api(resp) if resp.code == 404 => {
                Error::not_found(format!("service {}/{} not found", namespace, name))
            }
            e => Error::api(format!("failed to query service {}/{}", namespace, name), e),
        })
    }
}

/// Resolves `<service>.<namespace><suffix>[:port]` to `clusterIP:port`.
#[derive(Clone)]
pub struct ServiceResolver {
    suffix: String,
    lookup: Arc<dyn ServiceLookup>,
}

impl ServiceResolver {
    pub fn new(lookup: Arc<dyn ServiceLookup>) -> Self {
        Self {
            suffix: SERVICE_ADDR_SUFFIX.to_string(),
            lookup,
        }
    }

    /// Resolver backed by the discovered kubeconfig.
    pub fn from_kubeconfig() -> Self {
        Self::new(Arc::new(KubeconfigLookup::new(KubeconfigSource::Detect)))
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Parse `addr` without touching the API.
    pub fn locate(&self, addr: &str) -> Result<ServiceLocator> {
        ServiceLocator::parse(addr, &self.suffix)
    }

    pub async fn resolve(&self, ctx: &Context, addr: &str) -> Result<String> {
        let locator = self.locate(addr)?;
        info!("Resolving service {} via the cluster API", locator);

        let service = ctx
            .run(self.lookup.get_service(&locator.namespace, &locator.name))
            .await?;
        let spec = service
            .spec
            .ok_or_else(|| Error::bad_parameter(format!("service {} has no spec", locator)))?;

        let port = match locator.port {
            Some(port) => port,
            None => {
                let first = spec.ports.as_deref().and_then(|ports| ports.first()).ok_or_else(|| {
                    Error::bad_parameter(format!("service {} has no ports", locator))
                })?;
                u16::try_from(first.port).map_err(|_| {
                    Error::bad_parameter(format!(
                        "service {} declares invalid port {}",
                        locator, first.port
                    ))
                })?
            }
        };

        let cluster_ip = spec
            .cluster_ip
            .filter(|ip| !ip.is_empty() && ip != "None")
            .ok_or_else(|| {
                Error::bad_parameter(format!("service {} has no cluster IP", locator))
            })?;

        Ok(join_host_port(&cluster_ip, port))
    }

    pub async fn dial(&self, ctx: &Context, network: Network, addr: &str) -> Result<Conn> {
        let resolved = self.resolve(ctx, addr).await?;
        debug!("Dialing service {} at {}", addr, resolved);
        dial(ctx, network, &resolved).await
    }
}

impl fmt::Debug for ServiceResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceResolver")
            .field("suffix", &self.suffix)
            .finish()
    }
}
