//! HTTP client construction: TLS and dial options, Kubernetes API clients,
//! tunnel clients and the container runtime RPC client.

pub mod client;
pub mod kube;
pub mod runtime;
pub mod tls;
pub mod transport;
pub mod tunnel;

pub use client::{ClientBuilder, ClientOption, HttpClient, ResponseBody, read_body};
pub use kube::{KubeClientBuilder, KubeConfigOption, KubeRole};
pub use runtime::runtime_rpc_client;
pub use transport::{PoolDefaults, TlsSettings, Transport};
pub use tunnel::{RemoteSite, remote_client};
