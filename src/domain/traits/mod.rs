//! Domain traits - Abstractions for infrastructure implementations

pub mod loader;
pub mod module;
pub mod store;

pub use loader::{LoadedModule, ModuleLoader};
pub use module::{construct_module, Module, ModuleInitFn, MODULE_INIT_SYMBOL};
pub use store::Store;
