//! Application layer errors

use std::path::PathBuf;
use thiserror::Error;

use crate::plugins::container::LifecycleState;

/// Errors raised while reading metadata out of a candidate artifact.
///
/// These never abort a scan: each one is recorded against its artifact and the
/// remaining candidates are still processed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Unreadable artifact {}: {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: String },

    #[error("Malformed artifact {}: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },
}

impl ExtractionError {
    pub fn unreadable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ExtractionError::Unreadable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ExtractionError::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Path of the artifact that failed
    pub fn path(&self) -> &std::path::Path {
        match self {
            ExtractionError::Unreadable { path, .. } | ExtractionError::Malformed { path, .. } => path,
        }
    }
}

/// Errors that prevent a load order from being computed. Fatal to a load batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Module '{module}' requires '{dependency}', which is not present")]
    MissingDependency { module: String, dependency: String },

    #[error("Module '{module}' requires '{dependency}' {required}, found version {found}")]
    IncompatibleVersion {
        module: String,
        dependency: String,
        required: String,
        found: u32,
    },

    #[error("Dependency cycle: {}", format_cycle(.0))]
    DependencyCycle(Vec<String>),

    #[error("Module '{0}' is declared more than once")]
    DuplicateModule(String),
}

fn format_cycle(ids: &[String]) -> String {
    match ids.first() {
        Some(first) => format!("{} -> {}", ids.join(" -> "), first),
        None => String::new(),
    }
}

/// Per-module lifecycle failures. Isolated to the module they name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Failed to load '{id}': {reason}")]
    LoadFailure { id: String, reason: String },

    #[error("Activation of '{id}' failed: {reason}")]
    ActivationFailure { id: String, reason: String },

    #[error("Deactivation of '{id}' failed: {reason}")]
    DeactivationFailure { id: String, reason: String },

    #[error("Module not found: {0}")]
    NotFound(String),

    #[error("Module '{id}' cannot go from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: LifecycleState,
        to: LifecycleState,
    },

    #[error("Module '{id}' requires '{dependency}' to be enabled first")]
    DependencyNotEnabled { id: String, dependency: String },

    #[error("Module '{id}' is still required by enabled module(s): {}", .dependents.join(", "))]
    DependentsEnabled { id: String, dependents: Vec<String> },
}

impl LifecycleError {
    /// Id of the module the failure is recorded against
    pub fn module_id(&self) -> &str {
        match self {
            LifecycleError::LoadFailure { id, .. }
            | LifecycleError::ActivationFailure { id, .. }
            | LifecycleError::DeactivationFailure { id, .. }
            | LifecycleError::InvalidTransition { id, .. }
            | LifecycleError::DependencyNotEnabled { id, .. }
            | LifecycleError::DependentsEnabled { id, .. } => id,
            LifecycleError::NotFound(id) => id,
        }
    }
}

/// Errors returned by a module's own enable/disable routines
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("{0}")]
    Failed(String),

    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ModuleError {
    pub fn failed(msg: impl Into<String>) -> Self {
        ModuleError::Failed(msg.into())
    }
}

/// Errors raised by a module's execution context
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Context of '{0}' is not active")]
    Inactive(String),

    #[error("No async runtime available to spawn background work")]
    NoRuntime,

    #[error("Invalid settings for '{module}': {reason}")]
    Settings { module: String, reason: String },

    #[error("Event error: {0}")]
    Event(#[from] EventError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Event bus errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while turning an artifact into a module instance
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoaderError {
    #[error("No loader supports module '{0}'")]
    Unsupported(String),

    #[error("Library not found: {}", .0.display())]
    LibraryNotFound(PathBuf),

    #[error("Failed to load library: {0}")]
    Library(String),

    #[error("Module constructor failed: {0}")]
    Constructor(String),
}

/// Service registry errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Provider for {0} is protected and cannot be replaced")]
    Protected(&'static str),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Command execution errors
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Command not found: {0}")]
    NotFound(String),

    #[error("Command already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_display_closes_the_loop() {
        let err = ResolutionError::DependencyCycle(vec!["x".to_string(), "y".to_string()]);
        assert_eq!(err.to_string(), "Dependency cycle: x -> y -> x");
    }

    #[test]
    fn test_incompatible_version_display() {
        let err = ResolutionError::IncompatibleVersion {
            module: "p".to_string(),
            dependency: "q".to_string(),
            required: ">=2".to_string(),
            found: 1,
        };
        assert_eq!(err.to_string(), "Module 'p' requires 'q' >=2, found version 1");
    }

    #[test]
    fn test_lifecycle_error_module_id() {
        let err = LifecycleError::DependentsEnabled {
            id: "core".to_string(),
            dependents: vec!["music".to_string()],
        };
        assert_eq!(err.module_id(), "core");
        assert!(err.to_string().contains("music"));
    }
}
