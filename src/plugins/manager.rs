//! Plugin manager - the host-facing entry point of the module system.
//!
//! Scans a plugin directory for artifacts, resolves the dependency order and
//! hands the lifecycle work to the [`LifecycleController`].

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::application::errors::{ExtractionError, LifecycleError, ResolutionError};
use crate::application::host::HostContext;
use crate::domain::traits::ModuleLoader;
use crate::infrastructure::plugins::{extract, is_candidate, Extracted};
use super::container::ModuleContainer;
use super::lifecycle::LifecycleController;
use super::report::{BatchReport, ScanReport};
use super::resolver;

/// Manages all modules of one host
pub struct PluginManager {
    controller: LifecycleController,
}

impl PluginManager {
    pub fn new(host: HostContext) -> Self {
        Self {
            controller: LifecycleController::new(host),
        }
    }

    /// Add a loader; loaders are tried in the order they were added
    pub fn with_loader(mut self, loader: impl ModuleLoader + 'static) -> Self {
        self.add_loader(Box::new(loader));
        self
    }

    pub fn add_loader(&mut self, loader: Box<dyn ModuleLoader>) {
        self.controller.add_loader(loader);
    }

    pub fn host(&self) -> &HostContext {
        self.controller.host()
    }

    /// Discover module artifacts in `directory`.
    ///
    /// Entries are visited in name order. Containers that never got loaded, or
    /// were unloaded, are dropped first; loaded ones are kept as they are.
    pub fn scan(&mut self, directory: impl AsRef<Path>) -> ScanReport {
        let directory = directory.as_ref();
        let mut report = ScanReport::default();

        let pruned = self.controller.prune_inactive();
        if pruned > 0 {
            debug!("Dropped {} inactive module(s) before rescanning", pruned);
        }

        if !directory.exists() {
            warn!("Plugin directory does not exist: {}", directory.display());
            return report;
        }

        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(e) => {
                report.errors.push(ExtractionError::unreadable(
                    directory,
                    format!("Failed to read plugin directory: {}", e),
                ));
                return report;
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.path()),
                Err(e) => {
                    warn!("Failed to read directory entry: {}", e);
                    None
                }
            })
            .collect();
        paths.sort();

        // Which artifact claimed each id during this scan
        let mut claimed: HashMap<String, PathBuf> = HashMap::new();

        for path in paths {
            if !is_candidate(&path) {
                debug!("Ignoring {}: not a module artifact", path.display());
                continue;
            }

            let Extracted { descriptor, artifact } = match extract(&path) {
                Ok(extracted) => extracted,
                Err(e) => {
                    warn!("Skipping artifact: {}", e);
                    report.errors.push(e);
                    continue;
                }
            };
            let id = descriptor.id.clone();

            if let Some(first) = claimed.get(&id) {
                let e = ExtractionError::malformed(
                    &path,
                    format!("module '{}' is already declared by {}", id, first.display()),
                );
                warn!("Skipping artifact: {}", e);
                report.errors.push(e);
                continue;
            }
            claimed.insert(id.clone(), path.clone());

            if let Some(existing) = self.controller.get(&id) {
                if existing.artifact().path == artifact.path {
                    debug!("Module {} is already {}", id, existing.state());
                } else {
                    let e = ExtractionError::malformed(
                        &path,
                        format!("module '{}' is already loaded from {}", id, existing.artifact().path.display()),
                    );
                    warn!("Skipping artifact: {}", e);
                    report.errors.push(e);
                }
                continue;
            }

            info!("Discovered module: {} v{} ({})", id, descriptor.version, artifact.name());
            let container = ModuleContainer::new(descriptor, artifact, self.controller.host().clone());
            self.controller.insert(container);
            report.discovered.push(id);
        }

        report
    }

    /// Dependency order of the current containers, without loading anything
    pub fn resolve(&self) -> Result<Vec<String>, ResolutionError> {
        resolver::resolve(self.controller.containers().map(|c| c.descriptor().as_ref()))
    }

    /// Resolve the dependency order and instantiate every discovered module.
    ///
    /// A resolution error aborts before anything is loaded.
    pub fn load_all(&mut self) -> Result<BatchReport, ResolutionError> {
        let order = self.resolve()
            .map_err(|e| {
                error!("Dependency resolution failed: {}", e);
                e
            })?;

        debug!("Resolved load order: {}", order.join(", "));
        self.controller.set_order(order);

        let report = self.controller.load_all();
        info!("Load finished: {}", report.summary());
        Ok(report)
    }

    pub fn enable_all(&mut self) -> BatchReport {
        let report = self.controller.enable_all();
        info!("Enable finished: {}", report.summary());
        report
    }

    pub fn disable_all(&mut self) -> BatchReport {
        let report = self.controller.disable_all();
        info!("Disable finished: {}", report.summary());
        report
    }

    pub fn enable(&mut self, id: &str) -> Result<(), LifecycleError> {
        self.controller.enable(id)
    }

    pub fn disable(&mut self, id: &str) -> Result<(), LifecycleError> {
        self.controller.disable(id)
    }

    pub fn unload(&mut self, id: &str) -> Result<(), LifecycleError> {
        self.controller.unload(id)
    }

    /// Disable and tear down every module, in reverse resolved order
    pub fn unload_all(&mut self) -> BatchReport {
        let report = self.controller.unload_all();
        info!("Unload finished: {}", report.summary());
        report
    }

    pub fn shutdown(&mut self) -> BatchReport {
        info!("Shutting down {} module(s)", self.len());
        self.unload_all()
    }

    pub fn get(&self, id: &str) -> Option<&ModuleContainer> {
        self.controller.get(id)
    }

    /// Containers in resolved order, then unresolved ones by id
    pub fn list(&self) -> Vec<&ModuleContainer> {
        self.controller.list()
    }

    pub fn len(&self) -> usize {
        self.controller.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controller.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::container::LifecycleState;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_scan_first_artifact_wins() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a-first.yml", "id: shared\nversion: 1\n");
        write(dir.path(), "b-second.yml", "id: shared\nversion: 2\n");
        write(dir.path(), "notes.txt", "not a module");

        let mut manager = PluginManager::new(HostContext::in_memory());
        let report = manager.scan(dir.path());

        assert_eq!(report.discovered, vec!["shared"]);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].path(), dir.path().join("b-second.yml"));
        assert_eq!(manager.get("shared").unwrap().descriptor().version, 1);
    }

    #[test]
    fn test_missing_directory_is_empty_scan() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = PluginManager::new(HostContext::in_memory());
        let report = manager.scan(dir.path().join("nope"));
        assert!(report.is_clean());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_rescan_drops_discovered_containers() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.yml", "id: a\nversion: 1\n");

        let mut manager = PluginManager::new(HostContext::in_memory());
        manager.scan(dir.path());
        assert_eq!(manager.get("a").unwrap().state(), LifecycleState::Discovered);

        fs::remove_file(dir.path().join("a.yml")).unwrap();
        write(dir.path(), "b.yml", "id: b\nversion: 1\n");
        let report = manager.scan(dir.path());

        assert_eq!(report.discovered, vec!["b"]);
        assert!(manager.get("a").is_none());
        assert_eq!(manager.len(), 1);
    }
}
