use std::fmt;
use std::net::{IpAddr, SocketAddr};

use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{
    LookupIpStrategy, NameServerConfigGroup, ResolverConfig, ResolverOpts,
};
use pkg_constants::network::DNS_PORT;
use pkg_types::{Context, Error, Network, Result, join_host_port, split_host_port};
use tracing::debug;

use crate::conn::Conn;
use crate::dial::dial;

/// Resolves host names against one alternate DNS server (A records only).
#[derive(Clone)]
pub struct LocalResolver {
    server: SocketAddr,
    resolver: TokioAsyncResolver,
}

impl LocalResolver {
    /// `dns_addr` is `ip:port` or a bare IP (port 53).
    pub fn new(dns_addr: &str) -> Result<Self> {
        let server = dns_addr
            .parse::<SocketAddr>()
            .or_else(|_| dns_addr.parse::<IpAddr>().map(|ip| SocketAddr::new(ip, DNS_PORT)))
            .map_err(|e| {
                Error::bad_parameter(format!("invalid DNS server address {:?}: {}", dns_addr, e))
            })?;

        let servers = NameServerConfigGroup::from_ips_clear(&[server.ip()], server.port(), true);
        let config = ResolverConfig::from_parts(None, vec![], servers);

        let mut options = ResolverOpts::default();
        options.attempts = 2;
        options.ip_strategy = LookupIpStrategy::Ipv4Only;

        Ok(Self {
            server,
            resolver: TokioAsyncResolver::tokio(config, options),
        })
    }

    pub fn server(&self) -> SocketAddr {
        self.server
    }

    /// Resolve the host part of `host:port`; IP literals are returned as is.
    pub async fn resolve_addr(&self, ctx: &Context, addr: &str) -> Result<String> {
        let (host, port) = split_host_port(addr)?;
        if host.parse::<IpAddr>().is_ok() {
            return Ok(addr.to_string());
        }

        let lookup = ctx
            .run(async {
                self.resolver.lookup_ip(host.as_str()).await.map_err(|e| Error::Resolve {
                    addr: addr.to_string(),
                    message: e.to_string(),
                })
            })
            .await?;
        let ip = lookup.iter().next().ok_or_else(|| Error::Resolve {
            addr: addr.to_string(),
            message: format!("no A records from {}", self.server),
        })?;

        debug!("Resolved {} to {} via {}", host, ip, self.server);
        Ok(join_host_port(&ip.to_string(), port))
    }

    pub async fn dial(&self, ctx: &Context, network: Network, addr: &str) -> Result<Conn> {
        let resolved = self.resolve_addr(ctx, addr).await?;
        dial(ctx, network, &resolved).await
    }
}

impl fmt::Debug for LocalResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalResolver")
            .field("server", &self.server)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn parses_server_address() {
        assert_eq!(
            LocalResolver::new("127.0.0.2").unwrap().server(),
            "127.0.0.2:53".parse().unwrap()
        );
        assert_eq!(
            LocalResolver::new("10.0.0.10:5353").unwrap().server(),
            "10.0.0.10:5353".parse().unwrap()
        );
        assert!(LocalResolver::new("dns.local").unwrap_err().is_bad_parameter());
    }

    #[tokio::test]
    async fn ip_literals_pass_through() {
        let resolver = LocalResolver::new("127.0.0.2").unwrap();
        let ctx = Context::background();
        assert_eq!(
            resolver.resolve_addr(&ctx, "10.1.2.3:443").await.unwrap(),
            "10.1.2.3:443"
        );
        assert_eq!(
            resolver.resolve_addr(&ctx, "[fd00::1]:80").await.unwrap(),
            "[fd00::1]:80"
        );
        assert!(resolver.resolve_addr(&ctx, "no-port").await.is_err());
    }

    #[tokio::test]
    async fn dial_ip_literal_without_lookup() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // nothing listens on this DNS server; a lookup would time out
        let resolver = LocalResolver::new("127.0.0.1:1").unwrap();

        let ctx = Context::background().with_timeout(Duration::from_secs(5));
        let conn = resolver.dial(&ctx, Network::Tcp, &addr.to_string()).await.unwrap();
        assert_eq!(conn.peer_addr(), Some(addr));
    }
}
