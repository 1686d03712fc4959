//! Address resolution and dialing: the plain dialer, the alternate-DNS
//! local resolver, the cluster service resolver and the dial strategy chain
//! that combines them.

pub mod conn;
pub mod dial;
pub mod dns;
pub mod kubeconfig;
pub mod service;

pub use conn::{Conn, Io};
pub use dial::{DialFunc, Dialer, dial};
pub use dns::LocalResolver;
pub use service::{KubeconfigLookup, KubeconfigSource, ServiceLookup, ServiceResolver};
