//! modbay - a plugin host.
//!
//! Discovers modules in a plugin directory, orders them by their declared
//! dependencies and drives each one through load, enable, disable and unload
//! while keeping a failure in one module from affecting the others.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod plugins;

pub use application::errors::{
    ContextError, EventError, ExtractionError, LifecycleError, LoaderError, ModuleError, ResolutionError,
};
pub use application::host::HostContext;
pub use domain::entities::{Dependency, ModuleDescriptor, VersionRequirement};
pub use domain::traits::{Module, ModuleLoader};
pub use infrastructure::config::Config;
pub use plugins::{LifecycleState, ModuleContext, PluginManager};
