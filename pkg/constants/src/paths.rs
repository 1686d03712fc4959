//! Filesystem path constants.

// ─── State ────────────────────────────────────────────────────────────────

/// Default state directory when `CLUSTERDIAL_STATE_DIR` is unset.
pub const DEFAULT_STATE_DIR: &str = "/var/lib/clusterdial";

/// Directory under the state directory that holds certificates and keys.
pub const SECRETS_SUBDIR: &str = "secrets";

/// Default config file path for the CLI.
pub const DEFAULT_CONFIG: &str = "/etc/clusterdial/config.yaml";

// ─── Kubernetes ───────────────────────────────────────────────────────────

/// Kubeconfig location inside the container runtime's root filesystem.
pub const KUBECONFIG: &str = "/etc/kubernetes/kubectl.kubeconfig";

/// Helper executable used to locate the runtime root filesystem from the host.
pub const KUBECTL: &str = "kubectl";

/// Marker file present only inside the managed container runtime.
pub const CONTAINER_ENVIRONMENT_FILE: &str = "/etc/container-environment";
