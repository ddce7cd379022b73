//! Module system for modbay
//!
//! Discovery, dependency ordering and lifecycle management of host modules.

pub mod container;
pub mod context;
pub mod lifecycle;
pub mod manager;
pub mod report;
pub mod resolver;

pub use container::{LifecycleState, ModuleContainer};
pub use context::{ModuleContext, Released, ScopedStore};
pub use lifecycle::LifecycleController;
pub use manager::PluginManager;
pub use report::{BatchReport, ScanReport, SkipReason, SkippedModule};
pub use resolver::resolve;
