//! Application layer - Host services and use cases
//!
//! This layer contains:
//! - Host: the capabilities handed to every module
//! - Services: events, commands, service registry, management commands
//! - Errors: Domain-specific errors

pub mod errors;
pub mod host;
pub mod services;

pub use host::HostContext;
