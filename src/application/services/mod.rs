//! Application services - Shared host services

pub mod command_service;
pub mod event_bus;
pub mod management;
pub mod service_registry;

pub use command_service::CommandService;
pub use event_bus::{EventBus, EventHandler, SubscriptionId};
pub use management::{dispatch, ManagementCommand, Reply};
pub use service_registry::ServiceRegistry;
