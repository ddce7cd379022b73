//! Lifecycle controller - drives containers through load, enable, disable
//! and unload.
//!
//! The controller exclusively owns the container index and the resolved order.
//! Every module routine runs behind a panic guard so one faulty module never
//! stops a batch: its failure is recorded and the remaining modules proceed.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, info, warn};

use crate::application::errors::{LifecycleError, LoaderError, ModuleError};
use crate::application::host::HostContext;
use crate::domain::traits::{LoadedModule, ModuleLoader};
use super::container::{LifecycleState, ModuleContainer};
use super::report::{BatchReport, SkipReason};

pub struct LifecycleController {
    host: HostContext,
    loaders: Vec<Box<dyn ModuleLoader>>,
    containers: HashMap<String, ModuleContainer>,
    order: Vec<String>,
}

impl LifecycleController {
    pub fn new(host: HostContext) -> Self {
        Self {
            host,
            loaders: Vec::new(),
            containers: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Add a loader; loaders are tried in registration order
    pub fn add_loader(&mut self, loader: Box<dyn ModuleLoader>) {
        self.loaders.push(loader);
    }

    pub fn host(&self) -> &HostContext {
        &self.host
    }

    pub fn get(&self, id: &str) -> Option<&ModuleContainer> {
        self.containers.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.containers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Resolved order, followed by modules not yet resolved in id order
    pub fn ordered_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.order
            .iter()
            .filter(|id| self.containers.contains_key(*id))
            .cloned()
            .collect();

        let mut rest: Vec<String> = self.containers
            .keys()
            .filter(|id| !self.order.contains(*id))
            .cloned()
            .collect();
        rest.sort();
        ids.extend(rest);
        ids
    }

    pub fn list(&self) -> Vec<&ModuleContainer> {
        self.ordered_ids()
            .iter()
            .filter_map(|id| self.containers.get(id))
            .collect()
    }

    pub fn containers(&self) -> impl Iterator<Item = &ModuleContainer> {
        self.containers.values()
    }

    pub(crate) fn insert(&mut self, container: ModuleContainer) {
        self.containers.insert(container.id().to_string(), container);
    }

    /// Drop containers that were never loaded or have been torn down
    pub(crate) fn prune_inactive(&mut self) -> usize {
        let before = self.containers.len();
        self.containers.retain(|_, c| c.state().is_loaded());
        let containers = &self.containers;
        self.order.retain(|id| containers.contains_key(id));
        before - self.containers.len()
    }

    pub(crate) fn set_order(&mut self, order: Vec<String>) {
        self.order = order;
    }

    /// Instantiate every `Discovered` module in resolved order
    pub fn load_all(&mut self) -> BatchReport {
        let mut report = BatchReport::default();

        for id in self.order.clone() {
            let Some(container) = self.containers.get(&id) else {
                continue;
            };
            match container.state() {
                LifecycleState::Discovered => {}
                LifecycleState::Unloaded => continue,
                _ => {
                    report.unchanged.push(id);
                    continue;
                }
            }

            if let Some(reason) = self.unmet_dependency(&id, false, |s| s.is_loaded()) {
                warn!("Not loading {}: {}", id, reason);
                report.skip(id, reason);
                continue;
            }

            match self.load(&id) {
                Ok(()) => report.succeeded.push(id),
                Err(e) => report.failed.push(e),
            }
        }

        report
    }

    fn load(&mut self, id: &str) -> Result<(), LifecycleError> {
        let container = self.containers.get(id)
            .ok_or_else(|| LifecycleError::NotFound(id.to_string()))?;

        let loaded = instantiate(&self.loaders, container);
        let container = self.containers.get_mut(id)
            .ok_or_else(|| LifecycleError::NotFound(id.to_string()))?;

        match loaded {
            Ok(module) => {
                container.attach(module);
                container.clear_error();
                container.set_state(LifecycleState::Loaded);
                info!("Loaded module: {} v{}", id, container.descriptor().version);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to load module {}: {}", id, e);
                container.record_error(e.to_string());
                Err(LifecycleError::LoadFailure {
                    id: id.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Enable every loaded module in resolved order.
    ///
    /// Containers outside the resolved order (added by a later scan) are
    /// visited last and reported as not loaded.
    pub fn enable_all(&mut self) -> BatchReport {
        let mut report = BatchReport::default();

        for id in self.ordered_ids() {
            let Some(container) = self.containers.get(&id) else {
                continue;
            };
            match container.state() {
                LifecycleState::Enabled => {
                    report.unchanged.push(id);
                    continue;
                }
                LifecycleState::Unloaded => continue,
                LifecycleState::Discovered => {
                    report.skip(id, SkipReason::NotLoaded);
                    continue;
                }
                LifecycleState::Loaded | LifecycleState::Disabled => {}
            }

            if self.host.config().is_disabled(&id) {
                debug!("Not enabling {}: disabled by configuration", id);
                report.skip(id, SkipReason::DisabledByConfig);
                continue;
            }

            if let Some(reason) = self.unmet_dependency(&id, true, |s| s == LifecycleState::Enabled) {
                warn!("Skipping {}: {}", id, reason);
                report.skip(id, reason);
                continue;
            }

            match self.activate(&id) {
                Ok(()) => report.succeeded.push(id),
                Err(e) => report.failed.push(e),
            }
        }

        report
    }

    /// Disable every enabled module, dependents before their dependencies
    pub fn disable_all(&mut self) -> BatchReport {
        let mut report = BatchReport::default();

        for id in self.order.clone().into_iter().rev() {
            let Some(container) = self.containers.get(&id) else {
                continue;
            };
            match container.state() {
                LifecycleState::Enabled => {}
                LifecycleState::Loaded | LifecycleState::Disabled => {
                    report.unchanged.push(id);
                    continue;
                }
                LifecycleState::Discovered | LifecycleState::Unloaded => continue,
            }

            match self.deactivate(&id) {
                Ok(()) => report.succeeded.push(id),
                Err(e) => report.failed.push(e),
            }
        }

        report
    }

    /// Enable one module; its required dependencies must already be enabled
    pub fn enable(&mut self, id: &str) -> Result<(), LifecycleError> {
        let state = self.state_of(id)?;
        match state {
            LifecycleState::Enabled => return Ok(()),
            LifecycleState::Loaded | LifecycleState::Disabled => {}
            from => {
                return Err(LifecycleError::InvalidTransition {
                    id: id.to_string(),
                    from,
                    to: LifecycleState::Enabled,
                })
            }
        }

        if let Some(reason) = self.unmet_dependency(id, true, |s| s == LifecycleState::Enabled) {
            let dependency = match reason {
                SkipReason::DependencyNotReady { dependency, .. }
                | SkipReason::DependencyMissing { dependency } => dependency,
                _ => String::new(),
            };
            return Err(LifecycleError::DependencyNotEnabled {
                id: id.to_string(),
                dependency,
            });
        }

        self.activate(id)
    }

    /// Disable one module; refused while an enabled module depends on it
    pub fn disable(&mut self, id: &str) -> Result<(), LifecycleError> {
        let state = self.state_of(id)?;
        match state {
            LifecycleState::Enabled => {}
            LifecycleState::Loaded | LifecycleState::Disabled => return Ok(()),
            from => {
                return Err(LifecycleError::InvalidTransition {
                    id: id.to_string(),
                    from,
                    to: LifecycleState::Disabled,
                })
            }
        }

        let dependents = self.enabled_dependents(id);
        if !dependents.is_empty() {
            return Err(LifecycleError::DependentsEnabled {
                id: id.to_string(),
                dependents,
            });
        }

        self.deactivate(id)
    }

    /// Tear one module down. It must not be enabled.
    pub fn unload(&mut self, id: &str) -> Result<(), LifecycleError> {
        let state = self.state_of(id)?;
        match state {
            LifecycleState::Unloaded => Ok(()),
            LifecycleState::Enabled => Err(LifecycleError::InvalidTransition {
                id: id.to_string(),
                from: state,
                to: LifecycleState::Unloaded,
            }),
            _ => {
                self.teardown(id);
                Ok(())
            }
        }
    }

    /// Disable everything, then tear every module down in reverse order
    pub fn unload_all(&mut self) -> BatchReport {
        let disabled = self.disable_all();
        let mut report = BatchReport {
            failed: disabled.failed,
            ..BatchReport::default()
        };

        for id in self.ordered_ids().into_iter().rev() {
            match self.containers.get(&id).map(|c| c.state()) {
                Some(LifecycleState::Unloaded) => report.unchanged.push(id),
                Some(_) => {
                    self.teardown(&id);
                    report.succeeded.push(id);
                }
                None => {}
            }
        }

        report
    }

    fn teardown(&mut self, id: &str) {
        if let Some(container) = self.containers.get_mut(id) {
            container.teardown();
            info!("Unloaded module: {}", id);
        }
    }

    fn state_of(&self, id: &str) -> Result<LifecycleState, LifecycleError> {
        self.containers
            .get(id)
            .map(|c| c.state())
            .ok_or_else(|| LifecycleError::NotFound(id.to_string()))
    }

    /// First dependency of `id` not in a state accepted by `ready`.
    /// Absent optional dependencies never count; present ones only when
    /// `required_only` is false.
    fn unmet_dependency(
        &self,
        id: &str,
        required_only: bool,
        ready: impl Fn(LifecycleState) -> bool,
    ) -> Option<SkipReason> {
        let container = self.containers.get(id)?;
        for dep in &container.descriptor().dependencies {
            if dep.optional && required_only {
                continue;
            }
            match self.containers.get(&dep.id) {
                Some(target) if ready(target.state()) => {}
                Some(target) => {
                    return Some(SkipReason::DependencyNotReady {
                        dependency: dep.id.clone(),
                        state: target.state(),
                    })
                }
                None if dep.optional => {}
                None => {
                    return Some(SkipReason::DependencyMissing {
                        dependency: dep.id.clone(),
                    })
                }
            }
        }
        None
    }

    /// Enabled modules declaring `id` as a dependency, in resolved order
    fn enabled_dependents(&self, id: &str) -> Vec<String> {
        self.ordered_ids()
            .into_iter()
            .filter(|other| {
                self.containers.get(other).is_some_and(|c| {
                    c.state() == LifecycleState::Enabled && c.descriptor().dependency_ids().any(|d| d == id)
                })
            })
            .collect()
    }

    fn activate(&mut self, id: &str) -> Result<(), LifecycleError> {
        let container = self.containers.get_mut(id)
            .ok_or_else(|| LifecycleError::NotFound(id.to_string()))?;
        let from = container.state();

        let Some((module, ctx)) = container.parts_mut() else {
            return Err(LifecycleError::InvalidTransition {
                id: id.to_string(),
                from,
                to: LifecycleState::Enabled,
            });
        };

        ctx.open();
        let outcome = guarded(|| module.instance_mut().enable(ctx));

        match outcome {
            Ok(()) => {
                container.clear_error();
                container.set_state(LifecycleState::Enabled);
                info!("Enabled module: {} v{}", id, container.descriptor().version);
                Ok(())
            }
            Err(reason) => {
                // Roll back whatever the failed attempt registered
                container.context_mut().release();
                container.record_error(reason.clone());
                warn!("Failed to enable module {}: {}", id, reason);
                Err(LifecycleError::ActivationFailure {
                    id: id.to_string(),
                    reason,
                })
            }
        }
    }

    fn deactivate(&mut self, id: &str) -> Result<(), LifecycleError> {
        let container = self.containers.get_mut(id)
            .ok_or_else(|| LifecycleError::NotFound(id.to_string()))?;

        let outcome = match container.parts_mut() {
            Some((module, ctx)) => guarded(|| module.instance_mut().disable(ctx)),
            None => Ok(()),
        };

        // Forced: the module ends up disabled even if its routine failed
        container.context_mut().release();
        container.set_state(LifecycleState::Disabled);

        match outcome {
            Ok(()) => {
                info!("Disabled module: {}", id);
                Ok(())
            }
            Err(reason) => {
                container.record_error(reason.clone());
                warn!("Module {} failed to disable cleanly: {}", id, reason);
                Err(LifecycleError::DeactivationFailure {
                    id: id.to_string(),
                    reason,
                })
            }
        }
    }
}

fn instantiate(
    loaders: &[Box<dyn ModuleLoader>],
    container: &ModuleContainer,
) -> Result<LoadedModule, LoaderError> {
    let descriptor = container.descriptor();
    let artifact = container.artifact();

    let loader = loaders
        .iter()
        .find(|l| l.supports(descriptor, artifact))
        .ok_or_else(|| LoaderError::Unsupported(descriptor.id.clone()))?;

    debug!("Loading {} with the {} loader", descriptor.id, loader.name());
    loader.load(descriptor, artifact)
}

/// Run a module routine, turning both errors and panics into a message
fn guarded<F>(call: F) -> Result<(), String>
where
    F: FnOnce() -> Result<(), ModuleError>,
{
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(format!("panicked: {}", panic_message(payload.as_ref()))),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
