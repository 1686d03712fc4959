//! Shared data model for clusterdial: addresses, service locators, the
//! error taxonomy, cancellation contexts and the config file.

pub mod addr;
pub mod config;
pub mod context;
pub mod error;
pub mod locator;

pub use addr::{Address, Network, join_host_port, split_host_port};
pub use context::Context;
pub use error::{BoxError, Error, ErrorKind, Result, ResultExt};
pub use locator::ServiceLocator;
