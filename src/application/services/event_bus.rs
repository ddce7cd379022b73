//! Event bus - named events fanned out to subscribed handlers

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::application::errors::EventError;
use crate::domain::entities::Event;

/// Event handler function type
pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Identifies one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    owner: Option<String>,
    handler: EventHandler,
}

pub struct EventBus {
    subscriptions: RwLock<HashMap<String, Vec<Subscription>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe `handler` to events called `name`
    pub fn subscribe(&self, owner: Option<&str>, name: &str, handler: EventHandler) -> Result<SubscriptionId, EventError> {
        let mut subs = self.subscriptions.write()
            .map_err(|_| EventError::Internal("Lock poisoned".to_string()))?;

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        subs.entry(name.to_string()).or_default().push(Subscription {
            id,
            owner: owner.map(str::to_string),
            handler,
        });
        Ok(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let Ok(mut subs) = self.subscriptions.write() else {
            return false;
        };
        let mut removed = false;
        for list in subs.values_mut() {
            let before = list.len();
            list.retain(|s| s.id != id);
            removed |= list.len() != before;
        }
        subs.retain(|_, list| !list.is_empty());
        removed
    }

    /// Remove every subscription held by `owner`
    pub fn unsubscribe_owner(&self, owner: &str) -> usize {
        let Ok(mut subs) = self.subscriptions.write() else {
            return 0;
        };
        let mut removed = 0;
        for list in subs.values_mut() {
            let before = list.len();
            list.retain(|s| s.owner.as_deref() != Some(owner));
            removed += before - list.len();
        }
        subs.retain(|_, list| !list.is_empty());
        removed
    }

    /// Deliver `event` to its subscribers, returning how many received it
    pub fn publish(&self, event: &Event) -> usize {
        // Handlers run outside the lock so they may publish or subscribe themselves.
        let handlers: Vec<EventHandler> = match self.subscriptions.read() {
            Ok(subs) => subs
                .get(&event.name)
                .map(|list| list.iter().map(|s| Arc::clone(&s.handler)).collect())
                .unwrap_or_default(),
            Err(_) => return 0,
        };

        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    pub fn subscriber_count(&self, name: &str) -> usize {
        self.subscriptions.read()
            .ok()
            .and_then(|subs| subs.get(name).map(Vec::len))
            .unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
