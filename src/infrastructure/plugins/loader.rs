//! Native loader - instantiates modules shipped as shared libraries

use libloading::{Library, Symbol};

use crate::application::errors::LoaderError;
use crate::domain::entities::{Artifact, ModuleDescriptor};
use crate::domain::traits::{LoadedModule, Module, ModuleInitFn, ModuleLoader, MODULE_INIT_SYMBOL};

/// Loads modules whose manifest names a `library`.
///
/// The library must export the constructor generated by
/// [`declare_module!`](crate::declare_module). The library handle stays alive
/// for as long as the instance it produced.
#[derive(Debug, Default)]
pub struct NativeLoader;

impl NativeLoader {
    pub fn new() -> Self {
        Self
    }
}

impl ModuleLoader for NativeLoader {
    fn name(&self) -> &str {
        "native"
    }

    fn supports(&self, _descriptor: &ModuleDescriptor, artifact: &Artifact) -> bool {
        artifact.library.is_some()
    }

    fn load(&self, descriptor: &ModuleDescriptor, artifact: &Artifact) -> Result<LoadedModule, LoaderError> {
        let library_path = artifact
            .library
            .as_ref()
            .ok_or_else(|| LoaderError::Unsupported(descriptor.id.clone()))?;

        if !library_path.exists() {
            return Err(LoaderError::LibraryNotFound(library_path.clone()));
        }

        // Load the library
        let library = unsafe {
            Library::new(library_path)
                .map_err(|e| LoaderError::Library(format!("{}: {}", library_path.display(), e)))?
        };

        // Get the constructor
        let init: ModuleInitFn = unsafe {
            let symbol: Symbol<ModuleInitFn> = library
                .get(MODULE_INIT_SYMBOL)
                .map_err(|e| LoaderError::Library(format!("Missing module constructor: {}", e)))?;
            *symbol
        };

        let instance = instantiate(init)?;

        tracing::info!("Loaded library for {} from {}", descriptor.id, library_path.display());

        Ok(LoadedModule::new(instance).with_keep_alive(Box::new(library)))
    }
}

/// Call an exported constructor and take ownership of the instance.
///
/// Constructors generated by `declare_module!` return null when they panic.
pub(crate) fn instantiate(init: ModuleInitFn) -> Result<Box<dyn Module>, LoaderError> {
    let raw = unsafe { init() };
    if raw.is_null() {
        return Err(LoaderError::Constructor("constructor returned null or panicked".to_string()));
    }
    Ok(unsafe { Box::from_raw(raw) })
}
