//! File-based storage implementation

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::traits::Store;
use crate::application::errors::StorageError;

/// JSON file-based key-value store
pub struct JsonStore {
    path: Option<PathBuf>,
    kv: Arc<RwLock<BTreeMap<String, String>>>,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            kv: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Store that never touches the filesystem
    pub fn in_memory() -> Self {
        Self {
            path: None,
            kv: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Read the backing file, if it exists
    pub async fn init(&self) -> Result<(), StorageError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                let data: BTreeMap<String, String> = serde_json::from_str(&content)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                *self.kv.write().await = data;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the current contents to the backing file
    pub async fn flush(&self) -> Result<(), StorageError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let content = {
            let kv = self.kv.read().await;
            serde_json::to_string_pretty(&*kv)
                .map_err(|e| StorageError::Serialization(e.to_string()))?
        };
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for JsonStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let kv = self.kv.read().await;
        Ok(kv.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        {
            let mut kv = self.kv.write().await;
            kv.insert(key.to_string(), value.to_string());
        }
        self.flush().await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let removed = {
            let mut kv = self.kv.write().await;
            kv.remove(key).is_some()
        };
        if removed {
            self.flush().await?;
        }
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let kv = self.kv.read().await;
        Ok(kv.keys().filter(|k| k.starts_with(prefix)).cloned().collect())
    }
}
