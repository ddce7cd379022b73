//! Service registry - capability type to provider mapping shared across modules

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::application::errors::ServiceError;

struct Provider {
    type_name: &'static str,
    value: Box<dyn Any + Send + Sync>,
    protected: bool,
    owner: Option<String>,
}

/// Registry of service providers keyed by capability type.
///
/// A provider registered as `protected` cannot be replaced; any other
/// provider is overridden by the next registration for the same type.
/// Overridden providers of other owners are kept underneath and become
/// current again when the overriding owner's providers are removed.
pub struct ServiceRegistry {
    /// Per type, the providers in registration order; the last one is current
    providers: RwLock<HashMap<TypeId, Vec<Provider>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a host-owned provider
    pub fn register<T>(&self, provider: Arc<T>, protected: bool) -> Result<(), ServiceError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.insert(provider, protected, None)
    }

    /// Register a provider owned by a module; removed again by [`ServiceRegistry::remove_owned`]
    pub fn register_owned<T>(&self, owner: &str, provider: Arc<T>, protected: bool) -> Result<(), ServiceError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.insert(provider, protected, Some(owner.to_string()))
    }

    fn insert<T>(&self, provider: Arc<T>, protected: bool, owner: Option<String>) -> Result<(), ServiceError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let type_name = std::any::type_name::<T>();
        let mut providers = self.providers.write()
            .map_err(|_| ServiceError::Internal("Lock poisoned".to_string()))?;

        let stack = providers.entry(TypeId::of::<T>()).or_default();
        if let Some(current) = stack.last() {
            if current.protected {
                return Err(ServiceError::Protected(type_name));
            }
            tracing::debug!("Overriding provider for {}", type_name);
        }

        // An owner overriding itself replaces its earlier entry
        stack.retain(|p| p.owner != owner);
        stack.push(Provider {
            type_name,
            value: Box::new(provider),
            protected,
            owner,
        });
        Ok(())
    }

    /// Get the current provider for `T`
    pub fn get<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.providers.read()
            .ok()?
            .get(&TypeId::of::<T>())
            .and_then(|stack| stack.last())
            .and_then(|p| p.value.downcast_ref::<Arc<T>>())
            .cloned()
    }

    pub fn is_protected<T>(&self) -> bool
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.providers.read()
            .ok()
            .and_then(|p| p.get(&TypeId::of::<T>()).and_then(|stack| stack.last()).map(|p| p.protected))
            .unwrap_or(false)
    }

    /// Drop every provider registered by `owner`, returning the removed type names.
    ///
    /// Where `owner` had overridden another provider, that one is current again.
    pub fn remove_owned(&self, owner: &str) -> Vec<&'static str> {
        let Ok(mut providers) = self.providers.write() else {
            return Vec::new();
        };

        let mut removed = Vec::new();
        providers.retain(|_, stack| {
            let before = stack.len();
            stack.retain(|p| {
                let owned = p.owner.as_deref() == Some(owner);
                if owned {
                    removed.push(p.type_name);
                }
                !owned
            });
            if let Some(current) = stack.last().filter(|_| stack.len() < before) {
                tracing::debug!("Restored provider for {}", current.type_name);
            }
            !stack.is_empty()
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.providers.read()
            .ok()
            .map(|p| p.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;
    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    struct Dutch;
    impl Greeter for Dutch {
        fn greet(&self) -> String {
            "hallo".to_string()
        }
    }

    #[test]
    fn test_overridable_provider_is_replaced() {
        let registry = ServiceRegistry::new();
        registry.register::<dyn Greeter>(Arc::new(English), false).unwrap();
        registry.register::<dyn Greeter>(Arc::new(Dutch), false).unwrap();

        assert_eq!(registry.get::<dyn Greeter>().unwrap().greet(), "hallo");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_protected_provider_is_kept() {
        let registry = ServiceRegistry::new();
        registry.register::<dyn Greeter>(Arc::new(English), true).unwrap();

        let err = registry.register::<dyn Greeter>(Arc::new(Dutch), false).unwrap_err();
        assert!(matches!(err, ServiceError::Protected(_)));
        assert!(registry.is_protected::<dyn Greeter>());
        assert_eq!(registry.get::<dyn Greeter>().unwrap().greet(), "hello");
    }

    #[test]
    fn test_remove_owned() {
        let registry = ServiceRegistry::new();
        registry.register_owned::<dyn Greeter>("i18n", Arc::new(English), false).unwrap();
        registry.register(Arc::new(42u32), true).unwrap();

        assert_eq!(registry.remove_owned("i18n").len(), 1);
        assert!(registry.get::<dyn Greeter>().is_none());
        assert_eq!(registry.get::<u32>().map(|v| *v), Some(42));
    }

    #[test]
    fn test_removing_override_restores_host_provider() {
        let registry = ServiceRegistry::new();
        registry.register::<dyn Greeter>(Arc::new(English), false).unwrap();
        registry.register_owned::<dyn Greeter>("dutch", Arc::new(Dutch), false).unwrap();
        assert_eq!(registry.get::<dyn Greeter>().unwrap().greet(), "hallo");

        assert_eq!(registry.remove_owned("dutch").len(), 1);
        assert_eq!(registry.get::<dyn Greeter>().unwrap().greet(), "hello");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_removing_shadowed_module_keeps_current() {
        let registry = ServiceRegistry::new();
        registry.register_owned::<dyn Greeter>("english", Arc::new(English), false).unwrap();
        registry.register_owned::<dyn Greeter>("dutch", Arc::new(Dutch), false).unwrap();

        registry.remove_owned("english");
        assert_eq!(registry.get::<dyn Greeter>().unwrap().greet(), "hallo");

        registry.remove_owned("dutch");
        assert!(registry.get::<dyn Greeter>().is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reregistering_owner_replaces_its_entry() {
        let registry = ServiceRegistry::new();
        registry.register_owned::<dyn Greeter>("i18n", Arc::new(English), false).unwrap();
        registry.register_owned::<dyn Greeter>("i18n", Arc::new(Dutch), false).unwrap();

        registry.remove_owned("i18n");
        assert!(registry.get::<dyn Greeter>().is_none());
    }
}
