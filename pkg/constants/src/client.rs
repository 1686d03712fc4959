//! HTTP client defaults.
//!
//! Applied at the end of client construction to any pool bound the caller
//! left unset, so no client keeps idle connections forever.

/// Idle connections are closed after this many seconds.
pub const CONNECTION_IDLE_TIMEOUT_SECS: u64 = 90;

/// Maximum idle connections kept per host.
pub const MAX_IDLE_CONNS_PER_HOST: usize = 5;

/// Initial delay between retries of a transient failure, in milliseconds.
pub const RETRY_INITIAL_DELAY_MS: u64 = 500;

/// Upper bound for the retry delay, in seconds.
pub const RETRY_MAX_DELAY_SECS: u64 = 10;
