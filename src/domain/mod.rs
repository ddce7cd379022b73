//! Domain layer - Core types the plugin host is built around
//! 
//! This layer contains:
//! - Entities: Module descriptors, artifacts, commands, events
//! - Traits: Abstractions for modules, loaders and storage

pub mod entities;
pub mod traits;
