use std::{collections::{BTreeMap, HashMap}, sync::Arc};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::DataManagerError;

use super::PersistenceStore;

/// Volatile store, used by tests and for dry runs.
#[derive(Clone, Default)]
pub struct MemoryStore {
    namespaces: Arc<Mutex<HashMap<String, BTreeMap<String, String>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceStore for MemoryStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, DataManagerError> {
        let namespaces = self.namespaces.lock().await;
        Ok(namespaces.get(namespace).and_then(|entries| entries.get(key)).cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: String) -> Result<(), DataManagerError> {
        let mut namespaces = self.namespaces.lock().await;
        namespaces.entry(namespace.to_string()).or_default().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, namespace: &str, key: &str) -> Result<(), DataManagerError> {
        let mut namespaces = self.namespaces.lock().await;
        if let Some(entries) = namespaces.get_mut(namespace) {
            entries.remove(key);
        }
        Ok(())
    }

    async fn iterate(&self, namespace: &str) -> Result<Vec<(String, String)>, DataManagerError> {
        let namespaces = self.namespaces.lock().await;
        Ok(namespaces
            .get(namespace)
            .map(|entries| entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    async fn scan_prefix(&self, namespace: &str, prefix: &str) -> Result<Vec<(String, String)>, DataManagerError> {
        let namespaces = self.namespaces.lock().await;
        let Some(entries) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn clear(&self, namespace: &str) -> Result<(), DataManagerError> {
        self.namespaces.lock().await.remove(namespace);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_behaves_like_a_store() {
        crate::store::tests::exercise_store(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn clones_share_data() {
        let store = MemoryStore::new();
        let clone = store.clone();
        store.set("ns", "k", "v".into()).await.unwrap();
        assert_eq!(clone.get("ns", "k").await.unwrap(), Some("v".to_string()));
    }
}
