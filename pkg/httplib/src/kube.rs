use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use kube::client::{Body, ConfigExt};
use kube::{Client, Config};
use pkg_constants::network::{API_SERVER_DOMAIN_NAME, API_SERVER_SECURE_PORT};
use pkg_constants::pki::{
    KUBELET_CERT_FILENAME, KUBELET_KEY_FILENAME, ROOT_CERT_FILENAME, SCHEDULER_CERT_FILENAME,
    SCHEDULER_KEY_FILENAME,
};
use pkg_network::{DialFunc, Dialer};
use pkg_pki::{certs_from_pem, read_pem, secret_path};
use pkg_types::{Error, Result};
use tower::{BoxError, ServiceBuilder};
use tracing::info;

use crate::transport::{PoolDefaults, Transport};

/// Identity a Kubernetes client authenticates with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KubeRole {
    /// Node agent credentials.
    Unprivileged,
    /// Control-plane credentials.
    Cluster,
}

impl KubeRole {
    fn key_pair(&self) -> (&'static str, &'static str) {
        match self {
            KubeRole::Unprivileged => (KUBELET_CERT_FILENAME, KUBELET_KEY_FILENAME),
            KubeRole::Cluster => (SCHEDULER_CERT_FILENAME, SCHEDULER_KEY_FILENAME),
        }
    }
}

/// Adjustment to the client configuration before the client is created.
#[derive(Clone)]
pub enum KubeConfigOption {
    /// API server URL, e.g. `https://10.0.0.1:6443`.
    Host(String),
    Custom(Arc<dyn Fn(&mut Config) + Send + Sync>),
}

impl fmt::Debug for KubeConfigOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KubeConfigOption::Host(host) => f.debug_tuple("Host").field(host).finish(),
            KubeConfigOption::Custom(_) => f.write_str("Custom"),
        }
    }
}

impl KubeConfigOption {
    fn apply(&self, config: &mut Config) -> Result<()> {
        match self {
            KubeConfigOption::Host(host) => {
                config.cluster_url = host
                    .parse()
                    .map_err(|e| Error::config(format!("invalid API server URL {:?}", host), e))?;
            }
            KubeConfigOption::Custom(f) => f(config),
        }
        Ok(())
    }
}

/// Builds Kubernetes clients from the credentials in the state directory.
pub struct KubeClientBuilder {
    role: KubeRole,
    state_dir: PathBuf,
    dialer: Option<Dialer>,
    pool: PoolDefaults,
    options: Vec<KubeConfigOption>,
}

impl KubeClientBuilder {
    pub fn new(role: KubeRole) -> Self {
        Self {
            role,
            state_dir: pkg_pki::state_dir(),
            dialer: None,
            pool: PoolDefaults::default(),
            options: Vec::new(),
        }
    }

    pub fn unprivileged() -> Self {
        Self::new(KubeRole::Unprivileged)
    }

    pub fn cluster() -> Self {
        Self::new(KubeRole::Cluster)
    }

    pub fn state_dir(mut self, state_dir: impl Into<PathBuf>) -> Self {
        self.state_dir = state_dir.into();
        self
    }

    /// Dial strategy for API connections. Defaults to the chain built from
    /// the process environment.
    pub fn dialer(mut self, dialer: Dialer) -> Self {
        self.dialer = Some(dialer);
        self
    }

    pub fn pool_defaults(mut self, pool: PoolDefaults) -> Self {
        self.pool = pool;
        self
    }

    pub fn option(mut self, option: KubeConfigOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn host(self, host: impl Into<String>) -> Self {
        self.option(KubeConfigOption::Host(host.into()))
    }

    pub fn configure(self, f: impl Fn(&mut Config) + Send + Sync + 'static) -> Self {
        self.option(KubeConfigOption::Custom(Arc::new(f)))
    }

    /// Client configuration with all options applied.
    pub fn config(&self) -> Result<Config> {
        let ca_path = secret_path(&self.state_dir, ROOT_CERT_FILENAME);
        let ca = read_pem(&ca_path)?;
        let roots = certs_from_pem(&ca)
            .map_err(|e| Error::config(format!("invalid CA certificate {}", ca_path.display()), e))?;

        let (cert_name, key_name) = self.role.key_pair();
        let default_url = format!("https://{}:{}", API_SERVER_DOMAIN_NAME, API_SERVER_SECURE_PORT);
        let mut config = Config::new(
            default_url
                .parse()
                .map_err(|e| Error::config("invalid API server URL", e))?,
        );
        config.root_cert = Some(roots.into_iter().map(|cert| cert.to_vec()).collect());
        config.auth_info.client_certificate = Some(path_string(secret_path(&self.state_dir, cert_name)));
        config.auth_info.client_key = Some(path_string(secret_path(&self.state_dir, key_name)));

        for option in &self.options {
            option.apply(&mut config)?;
        }
        Ok(config)
    }

    /// Create the client. Must be called within a Tokio runtime.
    pub fn build(self) -> Result<(Client, Config)> {
        let config = self.config()?;
        let dialer = match self.dialer {
            Some(dialer) => dialer,
            None => Dialer::from_environ(None)?,
        };

        pkg_pki::install_crypto_provider();
        let tls = config
            .rustls_client_config()
            .map_err(|e| Error::config("failed to configure TLS for the API server", e))?;

        let mut transport = Transport {
            dial: Some(DialFunc::from(dialer)),
            dial_timeout: config.connect_timeout,
            ..Default::default()
        };
        transport.apply_pool_defaults(self.pool);

        let https = HttpsConnectorBuilder::new()
            .with_tls_config(tls)
            .https_or_http()
            .enable_http1()
            .wrap_connector(transport.connector());
        let hyper = HyperClient::builder(TokioExecutor::new())
            .pool_idle_timeout(transport.idle_conn_timeout)
            .pool_max_idle_per_host(transport.max_idle_conns_per_host.unwrap_or(self.pool.max_idle_per_host))
            .pool_timer(TokioTimer::new())
            .build::<_, Body>(https);

        let auth = config
            .auth_layer()
            .map_err(|e| Error::config("failed to configure API authentication", e))?;
        let service = ServiceBuilder::new()
            .layer(config.base_uri_layer())
            .option_layer(auth)
            .map_err(BoxError::from)
            .service(hyper);

        info!(
            "Created {:?} kubernetes client for {}",
            self.role, config.cluster_url
        );
        let client = Client::new(service, config.default_namespace.clone());
        Ok((client, config))
    }
}

fn path_string(path: PathBuf) -> String {
    path.to_string_lossy().into_owned()
}
