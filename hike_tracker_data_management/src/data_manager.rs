use std::{path::Path, sync::Arc};

use serde::{de::DeserializeOwned, Serialize};

use crate::{store::{MemoryStore, PersistenceStore, SqliteStore}, DataManagerError};

#[derive(Clone)]
pub struct DataManager {
    pub(crate) store: Arc<dyn PersistenceStore>,
}

/// The public interface for all hike tracker data management.
impl DataManager {
    /// Opens (or creates) the SQLite database at `database_path`.
    pub async fn start(database_path: &Path) -> Result<Self, DataManagerError> {
        // Create data dir if it doesn't exist
        if let Some(data_dir) = database_path.parent() {
            if !data_dir.as_os_str().is_empty() && !data_dir.exists() {
                tokio::fs::create_dir_all(data_dir).await
                    .map_err(|_| DataManagerError::Io(format!("Failed to create data directory: {:?}", data_dir)))?;
            }
        }

        let store = SqliteStore::connect(database_path).await?;
        Ok(Self::with_store(Arc::new(store)))
    }

    pub fn with_store(store: Arc<dyn PersistenceStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, namespace: &str, key: &str) -> Result<Option<T>, DataManagerError> {
        let Some(value) = self.store.get(namespace, key).await? else {
            return Ok(None);
        };

        serde_json::from_str(&value)
            .map(Some)
            .map_err(|err| DataManagerError::Serialization(format!("Failed to decode {namespace}/{key}: {err}")))
    }

    pub(crate) async fn set_json<T: Serialize>(&self, namespace: &str, key: &str, value: &T) -> Result<(), DataManagerError> {
        let value = serde_json::to_string(value)
            .map_err(|err| DataManagerError::Serialization(format!("Failed to encode {namespace}/{key}: {err}")))?;
        self.store.set(namespace, key, value).await
    }

    /// Decodes every value under `prefix`. Entries that fail to decode are logged and skipped.
    pub(crate) async fn values_with_prefix<T: DeserializeOwned>(&self, namespace: &str, prefix: &str) -> Result<Vec<T>, DataManagerError> {
        let entries = self.store.scan_prefix(namespace, prefix).await?;

        Ok(entries
            .into_iter()
            .filter_map(|(key, value)| match serde_json::from_str(&value) {
                Ok(value) => Some(value),
                Err(err) => {
                    tracing::warn!("Skipping malformed entry {namespace}/{key}: {err}");
                    None
                }
            })
            .collect())
    }
}

/// `{prefix}_{16 hex chars}`
pub(crate) fn generate_id(prefix: &str) -> String {
    format!("{prefix}_{}", hex::encode(rand::random::<[u8; 8]>()))
}
