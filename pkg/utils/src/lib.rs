//! Helpers shared by clusterdial callers: atomic file writes and retries.

pub mod fs;
pub mod retry;

pub use fs::{with_temp_dir, write_atomic};
pub use retry::{RetryPolicy, retry_transient};
