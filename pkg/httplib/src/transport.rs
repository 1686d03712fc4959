use std::io;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use std::time::Duration;

use futures_util::future::BoxFuture;
use http::Uri;
use hyper::rt::{Read, ReadBufCursor, Write};
use hyper_util::client::legacy::connect::{Connected, Connection};
use hyper_util::rt::TokioIo;
use pkg_constants::client::{CONNECTION_IDLE_TIMEOUT_SECS, MAX_IDLE_CONNS_PER_HOST};
use pkg_network::{Conn, DialFunc};
use pkg_pki::ClientCertificate;
use pkg_types::{Context, Error, Network, Result, join_host_port};
use rustls::RootCertStore;
use tracing::debug;

/// TLS half of a transport.
#[derive(Debug, Clone, Default)]
pub struct TlsSettings {
    pub insecure_skip_verify: bool,
    /// Custom trust anchors; `None` means the platform's native roots.
    pub root_certs: Option<RootCertStore>,
    /// Client certificates for mTLS. Only the first is presented.
    pub client_certs: Vec<ClientCertificate>,
}

/// Connection-level settings of an HTTP client.
#[derive(Debug, Clone, Default)]
pub struct Transport {
    pub tls: TlsSettings,
    /// Custom dial hook; `None` dials with the system resolver.
    pub dial: Option<DialFunc>,
    pub dial_timeout: Option<Duration>,
    pub idle_conn_timeout: Option<Duration>,
    pub max_idle_conns_per_host: Option<usize>,
}

/// Pool bounds filled into a transport that leaves them unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolDefaults {
    pub idle_timeout: Duration,
    pub max_idle_per_host: usize,
}

impl Default for PoolDefaults {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(CONNECTION_IDLE_TIMEOUT_SECS),
            max_idle_per_host: MAX_IDLE_CONNS_PER_HOST,
        }
    }
}

impl Transport {
    pub(crate) fn apply_pool_defaults(&mut self, pool: PoolDefaults) {
        self.idle_conn_timeout.get_or_insert(pool.idle_timeout);
        self.max_idle_conns_per_host.get_or_insert(pool.max_idle_per_host);
    }

    pub(crate) fn connector(&self) -> Connector {
        Connector {
            dial: self.dial.clone().unwrap_or_else(DialFunc::direct),
            dial_timeout: self.dial_timeout,
        }
    }
}

/// `host:port` to dial for `uri`, defaulting the port from the scheme.
pub fn dial_address(uri: &Uri) -> Result<String> {
    let host = uri
        .host()
        .ok_or_else(|| Error::bad_parameter(format!("URL {} has no host", uri)))?;
    let port = match uri.port_u16() {
        Some(port) => port,
        None if uri.scheme_str() == Some("https") => 443,
        None => 80,
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    Ok(join_host_port(host, port))
}

/// Connector handing hyper the connections produced by a [`DialFunc`].
///
/// hyper gives connectors no request context, so the dial runs under a
/// background context bounded only by the dial timeout. The caller's
/// cancellation and the client timeout reach it by dropping the request
/// future, which drops the in-flight dial with it.
#[derive(Debug, Clone)]
pub struct Connector {
    dial: DialFunc,
    dial_timeout: Option<Duration>,
}

impl tower::Service<Uri> for Connector {
    type Response = HttpStream;
    type Error = Error;
    type Future = BoxFuture<'static, Result<HttpStream>>;

    fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let dial = self.dial.clone();
        let dial_timeout = self.dial_timeout;
        Box::pin(async move {
            let addr = dial_address(&uri)?;
            let ctx = match dial_timeout {
                Some(timeout) => Context::background().with_timeout(timeout),
                None => Context::background(),
            };
            debug!("Dialing {} for {}", addr, uri);
            let conn = dial.dial(ctx, Network::Tcp, addr).await?;
            Ok(HttpStream(TokioIo::new(conn)))
        })
    }
}

/// A dialed connection adapted to hyper's I/O traits.
pub struct HttpStream(TokioIo<Conn>);

impl Read for HttpStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().0).poll_read(cx, buf)
    }
}

impl Write for HttpStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().0).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().0).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().0).poll_shutdown(cx)
    }
}

impl Connection for HttpStream {
    fn connected(&self) -> Connected {
        Connected::new()
    }
}
