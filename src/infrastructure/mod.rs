//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: Configuration loading
//! - Storage: Data persistence
//! - Plugins: Module artifacts on disk and their loaders
//! - Adapters: Operator console

pub mod adapters;
pub mod config;
pub mod plugins;
pub mod storage;
