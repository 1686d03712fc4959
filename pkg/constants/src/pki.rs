//! Certificate and key file names under the secrets directory.

/// Cluster root CA certificate.
pub const ROOT_CERT_FILENAME: &str = "root.cert";

/// Node-agent (unprivileged) client certificate.
pub const KUBELET_CERT_FILENAME: &str = "kubelet.cert";

/// Node-agent (unprivileged) client key.
pub const KUBELET_KEY_FILENAME: &str = "kubelet.key";

/// Control-plane (cluster-privileged) client certificate.
pub const SCHEDULER_CERT_FILENAME: &str = "scheduler.cert";

/// Control-plane (cluster-privileged) client key.
pub const SCHEDULER_KEY_FILENAME: &str = "scheduler.key";

/// Key pair name for the container runtime RPC client.
/// Files are `RUNTIME_RPC_KEY_PAIR` + `.` + `CERT_SUFFIX` / `KEY_SUFFIX`.
pub const RUNTIME_RPC_KEY_PAIR: &str = "planet-rpc-client";

/// Extension of certificate files.
pub const CERT_SUFFIX: &str = "cert";

/// Extension of private key files.
pub const KEY_SUFFIX: &str = "key";
