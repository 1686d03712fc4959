use std::sync::Arc;

use async_trait::async_trait;
use http::Uri;
use pkg_constants::network::TUNNEL_LOCAL_MARKER;
use pkg_network::{Conn, DialFunc};
use pkg_types::{Address, Error, Result};
use tracing::debug;

use crate::client::{ClientBuilder, HttpClient};

/// A remote site reachable through a reverse tunnel.
#[async_trait]
pub trait RemoteSite: Send + Sync {
    fn name(&self) -> &str;

    /// Open a stream from `local` to `remote` through the tunnel.
    async fn dial(&self, local: &Address, remote: &Address) -> Result<Conn>;
}

/// HTTP client whose connections all go through `site`'s tunnel to the
/// authority of `remote_url`, whatever address a request names.
///
/// Server certificates are not verified; the tunnel handshake authenticates
/// the peer.
pub fn remote_client(site: Arc<dyn RemoteSite>, remote_url: &Uri) -> Result<HttpClient> {
    let authority = remote_url
        .authority()
        .ok_or_else(|| Error::bad_parameter(format!("remote URL {} has no host", remote_url)))?;
    let local = Address::tcp(TUNNEL_LOCAL_MARKER);
    let remote = Address::tcp(authority.as_str());

    debug!("Building client for {} via site {}", remote, site.name());
    let dial = DialFunc::new(move |ctx, _network, _addr| {
        let site = site.clone();
        let local = local.clone();
        let remote = remote.clone();
        async move { ctx.run(site.dial(&local, &remote)).await }
    });

    Ok(ClientBuilder::insecure_default().dial(dial).build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkg_types::Context;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    struct StubSite {
        dialed: Mutex<Vec<(Address, Address)>>,
    }

    #[async_trait]
    impl RemoteSite for StubSite {
        fn name(&self) -> &str {
            "remote.example.com"
        }

        async fn dial(&self, local: &Address, remote: &Address) -> Result<Conn> {
            self.dialed.lock().unwrap().push((local.clone(), remote.clone()));
            let (client, mut server) = tokio::io::duplex(4096);
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = server.read(&mut buf).await;
                let _ = server
                    .write_all(b"HTTP/1.1 204 No Content\r\nconnection: close\r\n\r\n")
                    .await;
            });
            Ok(Conn::from_io(client))
        }
    }

    #[tokio::test]
    async fn dials_through_tunnel_markers() {
        let site = Arc::new(StubSite {
            dialed: Mutex::new(Vec::new()),
        });
        let client =
            remote_client(site.clone(), &"https://ops.example.com:3009".parse().unwrap()).unwrap();
        assert!(client.transport().tls.insecure_skip_verify);
        assert_eq!(client.transport().idle_conn_timeout, Some(std::time::Duration::from_secs(90)));

        // the requested host is ignored in favour of the tunnel
        let resp = client
            .get(&Context::background(), "http://anything.invalid/status".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), 204);

        let dialed = site.dialed.lock().unwrap();
        assert_eq!(dialed.len(), 1);
        assert_eq!(dialed[0].0.to_string(), "tcp://127.0.0.1:3022");
        assert_eq!(dialed[0].1.to_string(), "tcp://ops.example.com:3009");
    }

    #[test]
    fn relative_url_rejected() {
        let site = Arc::new(StubSite {
            dialed: Mutex::new(Vec::new()),
        });
        let err = remote_client(site, &"/status".parse().unwrap()).unwrap_err();
        assert!(err.is_bad_parameter());
    }
}
