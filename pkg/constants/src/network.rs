//! Network-related constants.

/// Suffix every cluster-local service address ends with.
/// Full name = `<service>.<namespace>` + `SERVICE_ADDR_SUFFIX`.
pub const SERVICE_ADDR_SUFFIX: &str = ".svc.cluster.local";

/// Well-known domain name of the in-cluster Kubernetes API server.
pub const API_SERVER_DOMAIN_NAME: &str = "leader.cluster.local";

/// Secure port of the Kubernetes API server.
pub const API_SERVER_SECURE_PORT: u16 = 6443;

/// Port assumed for an alternate DNS server given without one.
pub const DNS_PORT: u16 = 53;

/// Local address marker handed to the tunnel dial primitive.
pub const TUNNEL_LOCAL_MARKER: &str = "127.0.0.1:3022";
