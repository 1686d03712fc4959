use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use pkg_constants::env;
use pkg_types::{Context, Error, Network, Result};
use tokio::net::{TcpStream, UdpSocket};
use tracing::{debug, warn};

use crate::conn::Conn;
use crate::dns::LocalResolver;
use crate::service::ServiceResolver;

/// Dial `addr` (`host:port`) on `network` using the system resolver.
///
/// Every resolved address of the network's family is tried in order; the
/// last connect error is returned if none succeeds.
pub async fn dial(ctx: &Context, network: Network, addr: &str) -> Result<Conn> {
    ctx.run(dial_system(network, addr)).await
}

async fn dial_system(network: Network, addr: &str) -> Result<Conn> {
    let targets: Vec<SocketAddr> = tokio::net::lookup_host(addr)
        .await
        .map_err(|e| Error::Resolve {
            addr: addr.to_string(),
            message: e.to_string(),
        })?
        .filter(|target| network.accepts(&target.ip()))
        .collect();

    let mut last_err = io::Error::new(
        io::ErrorKind::AddrNotAvailable,
        format!("no {} address found", network),
    );
    for target in targets {
        let res = if network.is_stream() {
            TcpStream::connect(target).await.map(Conn::Tcp)
        } else {
            connect_udp(target).await.map(Conn::Udp)
        };
        match res {
            Ok(conn) => return Ok(conn),
            Err(e) => {
                debug!("Connect to {} ({}) failed: {}", target, addr, e);
                last_err = e;
            }
        }
    }

    Err(Error::Dial {
        network: network.to_string(),
        addr: addr.to_string(),
        source: last_err,
    })
}

async fn connect_udp(target: SocketAddr) -> io::Result<UdpSocket> {
    let bind: SocketAddr = if target.is_ipv4() {
        ([0, 0, 0, 0], 0).into()
    } else {
        ([0u16; 8], 0).into()
    };
    let socket = UdpSocket::bind(bind).await?;
    socket.connect(target).await?;
    Ok(socket)
}

type DialFn = dyn Fn(Context, Network, String) -> BoxFuture<'static, Result<Conn>> + Send + Sync;

/// Type-erased dial hook stored in transports.
#[derive(Clone)]
pub struct DialFunc(Arc<DialFn>);

impl DialFunc {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Context, Network, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Conn>> + Send + 'static,
    {
        Self(Arc::new(move |ctx, network, addr| Box::pin(f(ctx, network, addr))))
    }

    /// The plain system dialer.
    pub fn direct() -> Self {
        Self::new(|ctx, network, addr| async move { dial(&ctx, network, &addr).await })
    }

    pub fn dial(
        &self,
        ctx: Context,
        network: Network,
        addr: impl Into<String>,
    ) -> BoxFuture<'static, Result<Conn>> {
        (self.0)(ctx, network, addr.into())
    }
}

impl fmt::Debug for DialFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DialFunc")
    }
}

impl From<Dialer> for DialFunc {
    fn from(dialer: Dialer) -> Self {
        DialFunc::new(move |ctx, network, addr| {
            let dialer = dialer.clone();
            async move { dialer.dial(&ctx, network, &addr).await }
        })
    }
}

impl From<LocalResolver> for DialFunc {
    fn from(resolver: LocalResolver) -> Self {
        DialFunc::new(move |ctx, network, addr| {
            let resolver = resolver.clone();
            async move { resolver.dial(&ctx, network, &addr).await }
        })
    }
}

/// Ordered dial strategy chain.
///
/// Inside a pod the address is dialed directly. Elsewhere the local resolver
/// (or the system resolver when no DNS server is configured) is tried first
/// and the service resolver last.
#[derive(Debug, Clone)]
pub struct Dialer {
    inside_pod: bool,
    local: Option<LocalResolver>,
    services: ServiceResolver,
}

impl Dialer {
    pub fn new(services: ServiceResolver) -> Self {
        Self {
            inside_pod: false,
            local: None,
            services,
        }
    }

    /// Build the chain from the process environment: `POD_IP` marks pod
    /// execution, `dns_addr` selects the alternate DNS server, and the service
    /// resolver discovers its kubeconfig on first use.
    pub fn from_environ(dns_addr: Option<&str>) -> Result<Self> {
        let inside_pod = std::env::var(env::POD_IP).is_ok_and(|ip| !ip.is_empty());
        let local = dns_addr.map(LocalResolver::new).transpose()?;
        Ok(Self {
            inside_pod,
            local,
            services: ServiceResolver::from_kubeconfig(),
        })
    }

    pub fn inside_pod(mut self, inside_pod: bool) -> Self {
        self.inside_pod = inside_pod;
        self
    }

    pub fn local_resolver(mut self, resolver: LocalResolver) -> Self {
        self.local = Some(resolver);
        self
    }

    pub fn service_resolver(mut self, services: ServiceResolver) -> Self {
        self.services = services;
        self
    }

    pub fn local(&self) -> Option<&LocalResolver> {
        self.local.as_ref()
    }

    pub fn services(&self) -> &ServiceResolver {
        &self.services
    }

    pub async fn dial(&self, ctx: &Context, network: Network, addr: &str) -> Result<Conn> {
        if self.inside_pod {
            debug!("Dialing {} directly from inside a pod", addr);
            return dial(ctx, network, addr).await;
        }

        let local = match &self.local {
            Some(resolver) => resolver.dial(ctx, network, addr).await,
            None => dial(ctx, network, addr).await,
        };
        match local {
            Ok(conn) => return Ok(conn),
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => warn!(
                "Failed to dial {} with local resolver, falling back to service resolver: {}",
                addr, e
            ),
        }

        self.services.dial(ctx, network, addr).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::tests::StubLookup;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn dial_tcp_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let conn = dial(&Context::background(), Network::Tcp, &addr).await.unwrap();
        assert_eq!(conn.peer_addr(), Some(listener.local_addr().unwrap()));
    }

    #[tokio::test]
    async fn family_mismatch_fails() {
        let err = dial(&Context::background(), Network::Tcp6, "127.0.0.1:80")
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn inside_pod_never_consults_services() {
        let lookup = StubLookup::with_ports("10.0.0.1", &[80]);
        let dialer = Dialer::new(ServiceResolver::new(lookup.clone())).inside_pod(true);

        let err = dialer
            .dial(&Context::background(), Network::Tcp, "foo.bar.svc.cluster.local")
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn falls_back_to_service_resolver() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let lookup = StubLookup::with_ports("127.0.0.1", &[port]);
        let dialer = Dialer::new(ServiceResolver::new(lookup.clone()));

        // the cluster suffix is not resolvable by the system resolver
        let conn = dialer
            .dial(&Context::background(), Network::Tcp, "web.default.svc.cluster.local")
            .await
            .unwrap();
        assert_eq!(conn.peer_addr(), Some(listener.local_addr().unwrap()));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_cluster_failure_is_not_applicable() {
        let lookup = StubLookup::with_ports("10.0.0.1", &[80]);
        let dialer = Dialer::new(ServiceResolver::new(lookup.clone()));

        let err = dialer
            .dial(&Context::background(), Network::Tcp, "10.0.0.1")
            .await
            .unwrap_err();
        assert!(err.is_not_applicable());
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancelled_chain_does_not_advance() {
        let lookup = StubLookup::with_ports("127.0.0.1", &[80]);
        let dialer = Dialer::new(ServiceResolver::new(lookup.clone()));
        let ctx = Context::background().with_cancel();
        ctx.cancel();

        let err = dialer
            .dial(&ctx, Network::Tcp, "web.default.svc.cluster.local:80")
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dial_func_from_closure() {
        let func = DialFunc::new(|_ctx, network, addr| async move {
            assert_eq!(network, Network::Udp);
            Err(Error::bad_parameter(addr))
        });
        let err = func
            .dial(Context::background().with_timeout(Duration::from_secs(1)), Network::Udp, "x:1")
            .await
            .unwrap_err();
        assert!(err.is_bad_parameter());
    }
}
