//! Module container - the runtime unit wrapping one module

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::application::host::HostContext;
use crate::domain::entities::{Artifact, ModuleDescriptor};
use crate::domain::traits::LoadedModule;
use super::context::ModuleContext;

/// Lifecycle state of a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LifecycleState {
    /// Descriptor extracted, module not instantiated
    Discovered,
    /// Instantiated, no module code has been activated
    Loaded,
    /// Activation routine completed
    Enabled,
    /// Deactivated; may be enabled again
    Disabled,
    /// Torn down. Terminal.
    Unloaded,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Discovered => "discovered",
            LifecycleState::Loaded => "loaded",
            LifecycleState::Enabled => "enabled",
            LifecycleState::Disabled => "disabled",
            LifecycleState::Unloaded => "unloaded",
        }
    }

    /// `Loaded` or any later, still-live state
    pub fn is_loaded(&self) -> bool {
        matches!(self, LifecycleState::Loaded | LifecycleState::Enabled | LifecycleState::Disabled)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One module: descriptor, artifact, execution context, instance and state.
///
/// Only the lifecycle controller mutates a container; everyone else sees it
/// through shared references.
pub struct ModuleContainer {
    descriptor: Arc<ModuleDescriptor>,
    artifact: Artifact,
    state: LifecycleState,
    context: ModuleContext,
    module: Option<LoadedModule>,
    last_error: Option<String>,
    enabled_at: Option<DateTime<Utc>>,
}

impl ModuleContainer {
    pub fn new(descriptor: ModuleDescriptor, artifact: Artifact, host: HostContext) -> Self {
        let context = ModuleContext::new(descriptor.id.clone(), host);
        Self {
            descriptor: Arc::new(descriptor),
            artifact,
            state: LifecycleState::Discovered,
            context,
            module: None,
            last_error: None,
            enabled_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn descriptor(&self) -> &Arc<ModuleDescriptor> {
        &self.descriptor
    }

    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Message of the most recent load/activation/deactivation failure
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn enabled_at(&self) -> Option<DateTime<Utc>> {
        self.enabled_at
    }

    pub fn context_id(&self) -> Uuid {
        self.context.context_id()
    }

    pub fn held_resources(&self) -> usize {
        self.context.held_resources()
    }

    pub(crate) fn set_state(&mut self, state: LifecycleState) {
        if state == LifecycleState::Enabled {
            self.enabled_at = Some(Utc::now());
        }
        self.state = state;
    }

    pub(crate) fn record_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }

    pub(crate) fn clear_error(&mut self) {
        self.last_error = None;
    }

    pub(crate) fn attach(&mut self, module: LoadedModule) {
        self.module = Some(module);
    }

    /// Split borrow of the instance and its context for enable/disable calls
    pub(crate) fn parts_mut(&mut self) -> Option<(&mut LoadedModule, &mut ModuleContext)> {
        let module = self.module.as_mut()?;
        Some((module, &mut self.context))
    }

    pub(crate) fn context_mut(&mut self) -> &mut ModuleContext {
        &mut self.context
    }

    /// Release the context, then drop the instance and whatever backs it
    pub(crate) fn teardown(&mut self) {
        self.context.release();
        self.module = None;
        self.state = LifecycleState::Unloaded;
    }
}

impl fmt::Debug for ModuleContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleContainer")
            .field("id", &self.descriptor.id)
            .field("version", &self.descriptor.version)
            .field("state", &self.state)
            .field("artifact", &self.artifact.path)
            .field("last_error", &self.last_error)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_container_is_discovered() {
        let container = ModuleContainer::new(
            ModuleDescriptor::new("music", 1),
            Artifact::new("plugins/music"),
            HostContext::in_memory(),
        );
        assert_eq!(container.id(), "music");
        assert_eq!(container.state(), LifecycleState::Discovered);
        assert!(!container.state().is_loaded());
        assert!(container.enabled_at().is_none());
    }

    #[test]
    fn test_teardown_is_terminal() {
        let mut container = ModuleContainer::new(
            ModuleDescriptor::new("music", 1),
            Artifact::new("plugins/music"),
            HostContext::in_memory(),
        );
        container.set_state(LifecycleState::Loaded);
        container.teardown();
        assert_eq!(container.state(), LifecycleState::Unloaded);
        assert!(container.parts_mut().is_none());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(LifecycleState::Enabled.to_string(), "enabled");
        assert!(LifecycleState::Disabled.is_loaded());
    }
}
