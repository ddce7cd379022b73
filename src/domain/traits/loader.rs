use std::any::Any;

use crate::application::errors::LoaderError;
use crate::domain::entities::{Artifact, ModuleDescriptor};
use super::module::Module;

/// Turns an extracted artifact into a module instance
pub trait ModuleLoader: Send + Sync {
    /// Loader name for diagnostics
    fn name(&self) -> &str;

    /// Whether this loader knows how to instantiate the module
    fn supports(&self, descriptor: &ModuleDescriptor, artifact: &Artifact) -> bool;

    /// Instantiate the module without activating it
    fn load(&self, descriptor: &ModuleDescriptor, artifact: &Artifact) -> Result<LoadedModule, LoaderError>;
}

/// A module instance plus whatever must outlive it (e.g. the native library)
pub struct LoadedModule {
    // Declared first: the instance must drop before the code backing it.
    instance: Box<dyn Module>,
    _keep_alive: Option<Box<dyn Any + Send>>,
}

impl LoadedModule {
    pub fn new(instance: Box<dyn Module>) -> Self {
        Self {
            instance,
            _keep_alive: None,
        }
    }

    pub fn with_keep_alive(mut self, guard: Box<dyn Any + Send>) -> Self {
        self._keep_alive = Some(guard);
        self
    }

    pub fn instance_mut(&mut self) -> &mut dyn Module {
        self.instance.as_mut()
    }
}
