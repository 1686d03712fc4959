use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use k8s_openapi::api::core::v1::Service;
use kube::Api;
use pkg_constants::network::SERVICE_ADDR_SUFFIX;
use pkg_constants::paths::DEFAULT_CONFIG;
use pkg_httplib::{ClientBuilder, KubeClientBuilder, KubeRole, read_body, runtime_rpc_client};
use pkg_network::{Dialer, ServiceResolver};
use pkg_pki::load_x509_key_pair;
use pkg_types::config::{DialConfigFile, load_config_file};
use pkg_types::{Context, Error, Network};
use pkg_utils::{RetryPolicy, retry_transient, write_atomic};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "clusterdial", about = "Resolve and dial cluster addresses")]
struct Cli {
    /// Path to YAML config file
    #[arg(long, short, default_value = DEFAULT_CONFIG)]
    config: String,

    /// Alternate DNS server (ip or ip:port)
    #[arg(long)]
    dns_addr: Option<String>,

    /// State directory holding the secrets
    #[arg(long, env = "CLUSTERDIAL_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Domain suffix of cluster service addresses
    #[arg(long)]
    service_suffix: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open a connection to an address through the dial chain
    Dial {
        addr: String,
        #[arg(long, default_value = "tcp")]
        network: Network,
        /// Total attempts for transient failures
        #[arg(long, default_value = "1")]
        retries: u32,
    },
    /// Print the address a name resolves to
    Resolve { addr: String },
    /// Fetch a URL
    Get {
        url: http::Uri,
        /// PEM file with CA certificates to trust
        #[arg(long)]
        ca: Option<PathBuf>,
        #[arg(long)]
        insecure: bool,
        /// Client certificate (requires --key)
        #[arg(long, requires = "key")]
        cert: Option<PathBuf>,
        #[arg(long, requires = "cert")]
        key: Option<PathBuf>,
        /// Request timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
        #[arg(long)]
        dial_timeout_secs: Option<u64>,
        /// Write the body to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
        #[arg(long, default_value = "1")]
        retries: u32,
    },
    /// Show a Service through the Kubernetes API
    Service {
        namespace: String,
        name: String,
        #[arg(long, value_enum, default_value = "unprivileged")]
        role: Role,
        /// API server URL
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Fetch a URL from the container runtime RPC endpoint
    Runtime { url: http::Uri },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Role {
    Unprivileged,
    Cluster,
}

impl From<Role> for KubeRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Unprivileged => KubeRole::Unprivileged,
            Role::Cluster => KubeRole::Cluster,
        }
    }
}

struct Settings {
    dns_addr: Option<String>,
    state_dir: PathBuf,
    service_suffix: String,
    api_host: Option<String>,
    dial_timeout: Option<Duration>,
}

impl Settings {
    fn dialer(&self) -> pkg_types::Result<Dialer> {
        let services = ServiceResolver::from_kubeconfig().with_suffix(&self.service_suffix);
        Ok(Dialer::from_environ(self.dns_addr.as_deref())?.service_resolver(services))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    // Load config file (returns defaults if file not found)
    let file_cfg: DialConfigFile = load_config_file(&cli.config)?;
    info!("Config file: {}", cli.config);

    // Merge: CLI args > config file > defaults
    let settings = Settings {
        dns_addr: cli.dns_addr.or(file_cfg.dns_addr),
        state_dir: cli
            .state_dir
            .or(file_cfg.state_dir.map(PathBuf::from))
            .unwrap_or_else(pkg_pki::state_dir),
        service_suffix: cli
            .service_suffix
            .or(file_cfg.service_suffix)
            .unwrap_or_else(|| SERVICE_ADDR_SUFFIX.to_string()),
        api_host: file_cfg.api_host,
        dial_timeout: file_cfg.dial_timeout_secs.map(Duration::from_secs),
    };

    let ctx = Context::background();
    match cli.command {
        Commands::Dial {
            addr,
            network,
            retries,
        } => {
            let dialer = settings.dialer()?;
            let policy = RetryPolicy::default().with_max_attempts(retries.max(1));
            let ctx = match settings.dial_timeout {
                Some(timeout) => ctx.with_timeout(timeout),
                None => ctx,
            };
            let conn = retry_transient(&ctx, &policy, || dialer.dial(&ctx, network, &addr)).await?;
            match conn.peer_addr() {
                Some(peer) => println!("Connected to {} ({})", addr, peer),
                None => println!("Connected to {}", addr),
            }
        }
        Commands::Resolve { addr } => {
            let dialer = settings.dialer()?;
            let resolved = match dialer.services().resolve(&ctx, &addr).await {
                Err(e) if e.is_not_applicable() => match dialer.local() {
                    Some(local) => local.resolve_addr(&ctx, &addr).await?,
                    None => tokio::net::lookup_host(addr.as_str())
                        .await?
                        .next()
                        .map(|a| a.to_string())
                        .ok_or_else(|| anyhow::anyhow!("no addresses found for {}", addr))?,
                },
                res => res?,
            };
            println!("{}", resolved);
        }
        Commands::Get {
            url,
            ca,
            insecure,
            cert,
            key,
            timeout_secs,
            dial_timeout_secs,
            output,
            retries,
        } => {
            let mut builder = ClientBuilder::new().local_resolver(settings.dialer()?);
            if let Some(ca) = ca {
                builder = builder.ca(pkg_pki::read_pem(&ca)?);
            }
            if insecure {
                builder = builder.insecure();
            }
            if let (Some(cert), Some(key)) = (cert, key) {
                builder = builder.client_cert(load_x509_key_pair(&cert, &key)?);
            }
            if let Some(timeout) = timeout_secs.map(Duration::from_secs) {
                builder = builder.timeout(timeout);
            }
            if let Some(timeout) = dial_timeout_secs.map(Duration::from_secs).or(settings.dial_timeout) {
                builder = builder.dial_timeout(timeout);
            }
            let client = builder.build();

            let policy = RetryPolicy::default().with_max_attempts(retries.max(1));
            let resp = retry_transient(&ctx, &policy, || client.get(&ctx, url.clone())).await?;
            let status = resp.status();
            info!("{} {}", status, url);
            let body = read_body(&ctx, resp).await?;

            match output {
                Some(path) => {
                    let written = write_atomic(&path, &body[..], 0o644)?;
                    println!("{} ({} bytes written to {})", status, written, path.display());
                }
                None => print!("{}", String::from_utf8_lossy(&body)),
            }
            if !status.is_success() {
                anyhow::bail!("server returned {}", status);
            }
        }
        Commands::Service {
            namespace,
            name,
            role,
            host,
            json,
        } => {
            let mut builder = KubeClientBuilder::new(role.into())
                .state_dir(&settings.state_dir)
                .dialer(settings.dialer()?);
            if let Some(host) = host.or(settings.api_host) {
                builder = builder.host(host);
            }
            let (client, config) = builder.build()?;
            info!("Querying service {}/{} from {}", namespace, name, config.cluster_url);

            let api: Api<Service> = Api::namespaced(client, &namespace);
            let service = api.get(&name).await.map_err(|e| match e {
                kube::Error::Api(resp) if resp.code == 404 => {
                    Error::not_found(format!("service {}/{} not found", namespace, name))
                }
                e => Error::api(format!("failed to query service {}/{}", namespace, name), e),
            })?;

            if json {
                println!("{}", serde_json::to_string_pretty(&service)?);
            } else {
                let spec = service.spec.unwrap_or_default();
                let ports: Vec<String> = spec
                    .ports
                    .unwrap_or_default()
                    .iter()
                    .map(|p| format!("{}/{}", p.port, p.protocol.as_deref().unwrap_or("TCP")))
                    .collect();
                println!("{:<24} {:<16} {}", "NAME", "CLUSTER-IP", "PORTS");
                println!(
                    "{:<24} {:<16} {}",
                    name,
                    spec.cluster_ip.as_deref().unwrap_or("<none>"),
                    ports.join(",")
                );
            }
        }
        Commands::Runtime { url } => {
            let builder = ClientBuilder::new().local_resolver(settings.dialer()?);
            let client = runtime_rpc_client(&settings.state_dir, builder)?;
            let resp = client.get(&ctx, url).await?;
            let status = resp.status();
            let body = read_body(&ctx, resp).await?;
            print!("{}", String::from_utf8_lossy(&body));
            if !status.is_success() {
                anyhow::bail!("runtime returned {}", status);
            }
        }
    }

    Ok(())
}
