//! Module artifacts on disk and the loaders that instantiate them.
//!
//! An artifact is either a bundle directory holding a `plugin.yml` (plus the
//! shared library it names) or a standalone `*.yml` manifest for a module
//! compiled into the host.

pub mod builtin;
pub mod loader;
pub mod manifest;

pub use builtin::{BuiltinLoader, ModuleFactory};
pub use loader::NativeLoader;
pub use manifest::{extract, is_candidate, Extracted, ModuleManifest};
