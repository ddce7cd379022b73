//! Reports returned by batch operations

use std::fmt;

use crate::application::errors::{ExtractionError, LifecycleError};
use super::container::LifecycleState;

/// Why a module was passed over by a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A dependency has not reached the state this step needs
    DependencyNotReady { dependency: String, state: LifecycleState },
    /// A required dependency is no longer present
    DependencyMissing { dependency: String },
    /// Configuration keeps the module from being enabled automatically
    DisabledByConfig,
    /// The module was never instantiated
    NotLoaded,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::DependencyNotReady { dependency, state } => {
                write!(f, "dependency '{}' is {}", dependency, state)
            }
            SkipReason::DependencyMissing { dependency } => write!(f, "dependency '{}' is missing", dependency),
            SkipReason::DisabledByConfig => write!(f, "disabled by configuration"),
            SkipReason::NotLoaded => write!(f, "not loaded"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedModule {
    pub id: String,
    pub reason: SkipReason,
}

/// Outcome of a load/enable/disable/unload batch
#[derive(Debug, Default, Clone)]
pub struct BatchReport {
    /// Modules that made the transition, in processing order
    pub succeeded: Vec<String>,
    /// Modules already in the target state
    pub unchanged: Vec<String>,
    pub failed: Vec<LifecycleError>,
    pub skipped: Vec<SkippedModule>,
}

impl BatchReport {
    pub fn skip(&mut self, id: impl Into<String>, reason: SkipReason) {
        self.skipped.push(SkippedModule {
            id: id.into(),
            reason,
        });
    }

    /// No failures and no skips
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.failed.iter().map(|e| e.module_id()).collect()
    }

    pub fn skipped_ids(&self) -> Vec<&str> {
        self.skipped.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} ok, {} unchanged, {} failed, {} skipped",
            self.succeeded.len(),
            self.unchanged.len(),
            self.failed.len(),
            self.skipped.len()
        )
    }
}

/// Outcome of scanning a plugin directory
#[derive(Debug, Default, Clone)]
pub struct ScanReport {
    /// Ids of the modules extracted successfully, in artifact name order
    pub discovered: Vec<String>,
    pub errors: Vec<ExtractionError>,
}

impl ScanReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}
