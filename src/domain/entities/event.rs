use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named event published on the host event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub payload: serde_json::Value,
    /// Id of the publishing module, `None` when the host publishes
    pub source: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            payload,
            source: None,
            timestamp: Utc::now(),
        }
    }

    pub fn from_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}
