use std::panic::{self, AssertUnwindSafe};

use crate::application::errors::ModuleError;
use crate::plugins::context::ModuleContext;

/// Main trait that every module implements.
///
/// Construction must be free of side effects; anything that touches the host
/// (subscriptions, commands, timers, services) belongs in [`Module::enable`],
/// done through the context so it can be released again.
pub trait Module: Send {
    /// Activate the module. Everything acquired through `ctx` is released if this fails.
    fn enable(&mut self, ctx: &mut ModuleContext) -> Result<(), ModuleError>;

    /// Deactivate the module. The context is released afterwards whatever the outcome.
    fn disable(&mut self, _ctx: &mut ModuleContext) -> Result<(), ModuleError> {
        Ok(())
    }
}

/// Function signature of the constructor exported by native modules
pub type ModuleInitFn = unsafe extern "C" fn() -> *mut dyn Module;

/// Name of the constructor symbol a native module exports
pub const MODULE_INIT_SYMBOL: &[u8] = b"modbay_module_init";

/// Export a native module constructor from a `cdylib` crate.
///
/// ```ignore
/// modbay::declare_module!(MusicModule, MusicModule::default);
/// ```
#[macro_export]
macro_rules! declare_module {
    ($module_type:ty, $constructor:path) => {
        #[no_mangle]
        #[allow(improper_ctypes_definitions)]
        pub extern "C" fn modbay_module_init() -> *mut dyn $crate::domain::traits::Module {
            $crate::domain::traits::construct_module::<$module_type, _>($constructor)
        }
    };
}

/// Run a module constructor and leak the boxed instance to the caller.
///
/// A panic must not unwind across the `extern "C"` boundary, so it is caught
/// here and reported as a null pointer.
#[doc(hidden)]
pub fn construct_module<M, F>(constructor: F) -> *mut dyn Module
where
    M: Module + 'static,
    F: FnOnce() -> M,
{
    match panic::catch_unwind(AssertUnwindSafe(constructor)) {
        Ok(module) => {
            let boxed: Box<dyn Module> = Box::new(module);
            Box::into_raw(boxed)
        }
        Err(_) => std::ptr::null_mut::<M>() as *mut dyn Module,
    }
}
