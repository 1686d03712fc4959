//! Environment variable names.

/// Set (non-empty) when running inside a managed pod.
pub const POD_IP: &str = "POD_IP";

/// Overrides the state directory.
pub const STATE_DIR: &str = "CLUSTERDIAL_STATE_DIR";
