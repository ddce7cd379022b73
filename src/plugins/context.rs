//! Module execution context.
//!
//! Each container owns exactly one context. Everything a module acquires from
//! the host goes through it and is tracked, so the context can hand all of it
//! back when the module is disabled, fails to enable, or is unloaded.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::application::errors::{ContextError, ModuleError, StorageError};
use crate::application::host::HostContext;
use crate::application::services::event_bus::SubscriptionId;
use crate::domain::entities::{Command, Event};
use crate::domain::traits::Store;

pub struct ModuleContext {
    module_id: String,
    context_id: Uuid,
    host: HostContext,
    active: bool,
    subscriptions: Vec<SubscriptionId>,
    commands: Vec<String>,
    services: usize,
    tasks: Vec<JoinHandle<()>>,
}

/// What a release handed back to the host
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Released {
    pub subscriptions: usize,
    pub commands: usize,
    pub services: usize,
    pub tasks: usize,
}

impl Released {
    pub fn total(&self) -> usize {
        self.subscriptions + self.commands + self.services + self.tasks
    }
}

impl ModuleContext {
    pub fn new(module_id: impl Into<String>, host: HostContext) -> Self {
        Self {
            module_id: module_id.into(),
            context_id: Uuid::new_v4(),
            host,
            active: false,
            subscriptions: Vec::new(),
            commands: Vec::new(),
            services: 0,
            tasks: Vec::new(),
        }
    }

    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    pub fn context_id(&self) -> Uuid {
        self.context_id
    }

    /// Capabilities are only available between `open` and `release`
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Number of tracked resources currently held
    pub fn held_resources(&self) -> usize {
        self.subscriptions.len() + self.commands.len() + self.services + self.tasks.len()
    }

    pub(crate) fn open(&mut self) {
        self.active = true;
    }

    /// Hand every tracked resource back and mark the context stale
    pub(crate) fn release(&mut self) -> Released {
        self.active = false;

        let mut released = Released::default();
        for id in self.subscriptions.drain(..) {
            if self.host.events().unsubscribe(id) {
                released.subscriptions += 1;
            }
        }

        if !self.commands.is_empty() {
            self.commands.clear();
            released.commands = self.host.commands().unregister_owner(&self.module_id);
        }

        if self.services > 0 {
            self.services = 0;
            released.services = self.host.services().remove_owned(&self.module_id).len();
        }

        for task in self.tasks.drain(..) {
            task.abort();
            released.tasks += 1;
        }

        if released.total() > 0 {
            tracing::debug!("Released {} resource(s) held by {}", released.total(), self.module_id);
        }
        released
    }

    fn ensure_active(&self) -> Result<(), ContextError> {
        if self.active {
            Ok(())
        } else {
            Err(ContextError::Inactive(self.module_id.clone()))
        }
    }

    /// Subscribe to a host event for as long as the module stays enabled
    pub fn subscribe<F>(&mut self, name: &str, handler: F) -> Result<SubscriptionId, ContextError>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.ensure_active()?;
        let id = self.host.events().subscribe(Some(&self.module_id), name, Arc::new(handler))?;
        self.subscriptions.push(id);
        Ok(id)
    }

    /// Publish an event on behalf of this module
    pub fn publish(&self, name: &str, payload: serde_json::Value) -> Result<usize, ContextError> {
        self.ensure_active()?;
        let event = Event::new(name, payload).from_source(self.module_id.clone());
        Ok(self.host.events().publish(&event))
    }

    pub fn register_command(&mut self, command: Command) -> Result<(), ModuleError> {
        self.ensure_active()?;
        let command = command.with_owner(self.module_id.clone());
        let name = command.name.clone();
        self.host.commands().register(command)?;
        self.commands.push(name);
        Ok(())
    }

    /// Provide a service to other modules. Removed when this context is released.
    pub fn register_service<T>(&mut self, provider: Arc<T>, protected: bool) -> Result<(), ModuleError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.ensure_active()?;
        self.host.services().register_owned(&self.module_id, provider, protected)?;
        self.services += 1;
        Ok(())
    }

    pub fn service<T>(&self) -> Result<Option<Arc<T>>, ContextError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.ensure_active()?;
        Ok(self.host.services().get::<T>())
    }

    /// Deserialize this module's `plugins.settings.<id>` section
    pub fn settings<T: DeserializeOwned>(&self) -> Result<Option<T>, ContextError> {
        self.ensure_active()?;
        let Some(raw) = self.host.config().module_settings(&self.module_id) else {
            return Ok(None);
        };

        serde_yaml::from_value(raw.clone())
            .map(Some)
            .map_err(|e| ContextError::Settings {
                module: self.module_id.clone(),
                reason: e.to_string(),
            })
    }

    /// Key-value storage namespaced to this module
    pub fn store(&self) -> Result<ScopedStore, ContextError> {
        self.ensure_active()?;
        Ok(ScopedStore::new(self.module_id.clone(), Arc::clone(self.host.store())))
    }

    /// Run background work owned by the module; aborted on release
    pub fn spawn<F>(&mut self, future: F) -> Result<(), ContextError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.ensure_active()?;
        let handle = tokio::runtime::Handle::try_current().map_err(|_| ContextError::NoRuntime)?;
        self.tasks.retain(|t| !t.is_finished());
        self.tasks.push(handle.spawn(future));
        Ok(())
    }

    /// Call `tick` every `period` until the module is disabled
    pub fn spawn_interval<F>(&mut self, period: Duration, mut tick: F) -> Result<(), ContextError>
    where
        F: FnMut() + Send + 'static,
    {
        self.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                tick();
            }
        })
    }
}

impl Drop for ModuleContext {
    fn drop(&mut self) {
        if self.held_resources() > 0 {
            self.release();
        }
    }
}

impl std::fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleContext")
            .field("module_id", &self.module_id)
            .field("context_id", &self.context_id)
            .field("active", &self.active)
            .field("held_resources", &self.held_resources())
            .finish()
    }
}

/// A view of the host store where every key is prefixed with the module id
#[derive(Clone)]
pub struct ScopedStore {
    namespace: String,
    inner: Arc<dyn Store>,
}

impl ScopedStore {
    pub fn new(namespace: impl Into<String>, inner: Arc<dyn Store>) -> Self {
        Self {
            namespace: namespace.into(),
            inner,
        }
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }
}

#[async_trait]
impl Store for ScopedStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(&self.scoped(key)).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.inner.set(&self.scoped(key), value).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.inner.delete(&self.scoped(key)).await
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let namespace = self.scoped("");
        let keys = self.inner.keys(&self.scoped(prefix)).await?;
        Ok(keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(&namespace).map(str::to_string))
            .collect())
    }
}
