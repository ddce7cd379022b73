//! Host application context shared with every module

use std::sync::Arc;

use crate::application::services::{CommandService, EventBus, ServiceRegistry};
use crate::domain::traits::Store;
use crate::infrastructure::config::Config;
use crate::infrastructure::storage::JsonStore;

/// Capabilities the host exposes to modules.
///
/// Cheap to clone; every module context holds its own clone.
#[derive(Clone)]
pub struct HostContext {
    config: Arc<Config>,
    services: Arc<ServiceRegistry>,
    events: Arc<EventBus>,
    commands: Arc<CommandService>,
    store: Arc<dyn Store>,
}

impl HostContext {
    pub fn new(config: Config, store: Arc<dyn Store>) -> Self {
        let commands = CommandService::new(config.host.prefix.clone());
        Self {
            config: Arc::new(config),
            services: Arc::new(ServiceRegistry::new()),
            events: Arc::new(EventBus::new()),
            commands: Arc::new(commands),
            store,
        }
    }

    /// Context over default configuration and an in-memory store
    pub fn in_memory() -> Self {
        Self::new(Config::default(), Arc::new(JsonStore::in_memory()))
    }

    pub fn with_config(config: Config) -> Self {
        Self::new(config, Arc::new(JsonStore::in_memory()))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn commands(&self) -> &Arc<CommandService> {
        &self.commands
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }
}
