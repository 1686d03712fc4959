use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::Duration;

use bytes::Bytes;
use http::{Request, Response, Uri};
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Frame, Incoming, SizeHint};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use pkg_network::{DialFunc, Dialer};
use pkg_pki::ClientCertificate;
use pkg_types::{Context, Error, Result};
use rustls::RootCertStore;
use tracing::debug;

use crate::tls::client_config;
use crate::transport::{Connector, PoolDefaults, Transport};

/// A single adjustment to a [`ClientBuilder`].
#[derive(Debug, Clone)]
pub enum ClientOption {
    /// Skip server certificate verification. Trust anchors already set are kept.
    Insecure,
    /// PEM-encoded CA certificates to trust.
    Ca(Vec<u8>),
    ClientCert(ClientCertificate),
    Dial(DialFunc),
    /// Route every dial through the strategy chain.
    LocalResolver(Dialer),
    DialTimeout(Duration),
    /// Bound on a whole request, including reading the response body
    /// with [`read_body`].
    Timeout(Duration),
    IdleConnTimeout(Duration),
    MaxIdleConnsPerHost(usize),
}

/// Builds [`HttpClient`]s. Options apply in call order, later ones winning.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    transport: Transport,
    timeout: Option<Duration>,
    pool: PoolDefaults,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    /// Secure defaults: server certificates are verified.
    pub fn new() -> Self {
        Self::with_pool_defaults(PoolDefaults::default())
    }

    /// Starting point with verification disabled.
    pub fn insecure_default() -> Self {
        Self::new().insecure()
    }

    pub fn with_pool_defaults(pool: PoolDefaults) -> Self {
        Self {
            transport: Transport::default(),
            timeout: None,
            pool,
        }
    }

    pub fn option(mut self, option: ClientOption) -> Self {
        match option {
            ClientOption::Insecure => self.transport.tls.insecure_skip_verify = true,
            ClientOption::Ca(pem) => {
                let roots = self
                    .transport
                    .tls
                    .root_certs
                    .get_or_insert_with(RootCertStore::empty);
                pkg_pki::append_certs_from_pem(roots, &pem);
            }
            ClientOption::ClientCert(cert) => self.transport.tls.client_certs.push(cert),
            ClientOption::Dial(dial) => self.transport.dial = Some(dial),
            ClientOption::LocalResolver(dialer) => self.transport.dial = Some(dialer.into()),
            ClientOption::DialTimeout(d) => self.transport.dial_timeout = Some(d),
            ClientOption::Timeout(d) => self.timeout = Some(d),
            ClientOption::IdleConnTimeout(d) => self.transport.idle_conn_timeout = Some(d),
            ClientOption::MaxIdleConnsPerHost(n) => self.transport.max_idle_conns_per_host = Some(n),
        }
        self
    }

    pub fn options(self, options: impl IntoIterator<Item = ClientOption>) -> Self {
        options.into_iter().fold(self, Self::option)
    }

    pub fn insecure(self) -> Self {
        self.option(ClientOption::Insecure)
    }

    pub fn ca(self, pem: impl Into<Vec<u8>>) -> Self {
        self.option(ClientOption::Ca(pem.into()))
    }

    pub fn client_cert(self, cert: ClientCertificate) -> Self {
        self.option(ClientOption::ClientCert(cert))
    }

    pub fn dial(self, dial: DialFunc) -> Self {
        self.option(ClientOption::Dial(dial))
    }

    pub fn local_resolver(self, dialer: Dialer) -> Self {
        self.option(ClientOption::LocalResolver(dialer))
    }

    pub fn dial_timeout(self, timeout: Duration) -> Self {
        self.option(ClientOption::DialTimeout(timeout))
    }

    pub fn timeout(self, timeout: Duration) -> Self {
        self.option(ClientOption::Timeout(timeout))
    }

    pub fn idle_conn_timeout(self, timeout: Duration) -> Self {
        self.option(ClientOption::IdleConnTimeout(timeout))
    }

    pub fn max_idle_conns_per_host(self, max: usize) -> Self {
        self.option(ClientOption::MaxIdleConnsPerHost(max))
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn build(self) -> HttpClient {
        let mut transport = self.transport;
        transport.apply_pool_defaults(self.pool);

        let https = HttpsConnectorBuilder::new()
            .with_tls_config(client_config(&transport.tls))
            .https_or_http()
            .enable_http1()
            .wrap_connector(transport.connector());

        let inner = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(transport.idle_conn_timeout)
            .pool_max_idle_per_host(transport.max_idle_conns_per_host.unwrap_or(self.pool.max_idle_per_host))
            .pool_timer(TokioTimer::new())
            .build(https);

        debug!(
            "Built HTTP client (insecure={}, custom_ca={}, client_certs={}, custom_dial={})",
            transport.tls.insecure_skip_verify,
            transport.tls.root_certs.is_some(),
            transport.tls.client_certs.len(),
            transport.dial.is_some()
        );

        HttpClient {
            inner,
            transport: Arc::new(transport),
            timeout: self.timeout,
        }
    }
}

/// HTTP(S) client over a configurable dial hook.
#[derive(Clone)]
pub struct HttpClient {
    inner: Client<HttpsConnector<Connector>, Full<Bytes>>,
    transport: Arc<Transport>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("transport", &self.transport)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpClient {
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Send `req`, giving up when `ctx` is done or the client timeout passes.
    ///
    /// The timeout keeps running after the headers arrive: the returned body
    /// carries the request's context and [`read_body`] stops at its deadline.
    pub async fn send(&self, ctx: &Context, req: Request<Full<Bytes>>) -> Result<Response<ResponseBody>> {
        let ctx = match self.timeout {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx.clone(),
        };
        let resp = ctx
            .run(async {
                self.inner
                    .request(req)
                    .await
                    .map_err(|e| Error::Request(Box::new(e)))
            })
            .await?;
        Ok(resp.map(|incoming| ResponseBody { incoming, ctx }))
    }

    pub async fn get(&self, ctx: &Context, uri: Uri) -> Result<Response<ResponseBody>> {
        let req = Request::get(uri)
            .body(Full::default())
            .map_err(|e| Error::bad_parameter(format!("invalid request: {}", e)))?;
        self.send(ctx, req).await
    }
}

/// Body of a response from [`HttpClient::send`], tied to the context of
/// the request that produced it.
///
/// Polling it directly as a [`Body`] does not enforce the deadline; use
/// [`read_body`] for that.
#[derive(Debug)]
pub struct ResponseBody {
    incoming: Incoming,
    ctx: Context,
}

impl ResponseBody {
    /// Context of the originating request, including the client timeout.
    pub fn context(&self) -> &Context {
        &self.ctx
    }
}

impl Body for ResponseBody {
    type Data = Bytes;
    type Error = hyper::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
    ) -> Poll<Option<std::result::Result<Frame<Bytes>, hyper::Error>>> {
        Pin::new(&mut self.get_mut().incoming).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.incoming.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.incoming.size_hint()
    }
}

/// Collect a response body, stopping when `ctx` is done or the deadline of
/// the originating request passes.
pub async fn read_body(ctx: &Context, response: Response<ResponseBody>) -> Result<Bytes> {
    let body = response.into_body();
    let request_ctx = body.ctx.clone();
    ctx.run(request_ctx.run(async move {
        let collected = body
            .collect()
            .await
            .map_err(|e| Error::Request(Box::new(e)))?;
        Ok(collected.to_bytes())
    }))
    .await
}
