//! Centralized constants for clusterdial.
//!
//! All project-wide constant values live here.
//! Change a value in one place and it applies everywhere.

pub mod client;
pub mod env;
pub mod network;
pub mod paths;
pub mod pki;
