//! Builtin loader - instantiates modules compiled into the host binary

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::application::errors::LoaderError;
use crate::domain::entities::{Artifact, ModuleDescriptor};
use crate::domain::traits::{LoadedModule, Module, ModuleLoader};
use crate::plugins::lifecycle::panic_message;

/// Constructor for a builtin module
pub type ModuleFactory = Box<dyn Fn() -> Box<dyn Module> + Send + Sync>;

/// Maps module ids to constructors linked into the host.
///
/// A manifest still has to be discovered for the module; the factory only
/// replaces the shared library.
#[derive(Default)]
pub struct BuiltinLoader {
    factories: HashMap<String, ModuleFactory>,
}

impl BuiltinLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor, replacing any earlier one for the same id
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Module> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Box::new(factory));
    }

    /// Builder-style [`register`](Self::register)
    pub fn with<F>(mut self, id: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Module> + Send + Sync + 'static,
    {
        self.register(id, factory);
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        ids.sort();
        ids
    }
}

impl fmt::Debug for BuiltinLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinLoader")
            .field("modules", &self.ids())
            .finish()
    }
}

impl ModuleLoader for BuiltinLoader {
    fn name(&self) -> &str {
        "builtin"
    }

    fn supports(&self, descriptor: &ModuleDescriptor, _artifact: &Artifact) -> bool {
        self.factories.contains_key(&descriptor.id)
    }

    fn load(&self, descriptor: &ModuleDescriptor, _artifact: &Artifact) -> Result<LoadedModule, LoaderError> {
        let factory = self
            .factories
            .get(&descriptor.id)
            .ok_or_else(|| LoaderError::Unsupported(descriptor.id.clone()))?;

        let instance = panic::catch_unwind(AssertUnwindSafe(|| factory()))
            .map_err(|payload| LoaderError::Constructor(format!("panicked: {}", panic_message(payload.as_ref()))))?;

        Ok(LoadedModule::new(instance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::errors::ModuleError;
    use crate::plugins::context::ModuleContext;

    struct Noop;

    impl Module for Noop {
        fn enable(&mut self, _ctx: &mut ModuleContext) -> Result<(), ModuleError> {
            Ok(())
        }
    }

    #[test]
    fn test_supports_registered_ids() {
        let loader = BuiltinLoader::new().with("noop", || Box::new(Noop));
        let artifact = Artifact::new("plugins/noop.yml");

        assert!(loader.supports(&ModuleDescriptor::new("noop", 1), &artifact));
        assert!(!loader.supports(&ModuleDescriptor::new("other", 1), &artifact));
        assert!(loader.load(&ModuleDescriptor::new("noop", 1), &artifact).is_ok());
        assert_eq!(loader.ids(), vec!["noop"]);
    }

    #[test]
    fn test_panicking_constructor_is_contained() {
        let loader = BuiltinLoader::new().with("bad", || -> Box<dyn Module> { panic!("no config") });
        let err = loader
            .load(&ModuleDescriptor::new("bad", 1), &Artifact::new("plugins/bad.yml"))
            .err()
            .unwrap();
        assert_eq!(err, LoaderError::Constructor("panicked: no config".to_string()));
    }
}
