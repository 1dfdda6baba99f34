use async_trait::async_trait;

use crate::DataManagerError;

mod constants;
mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub const HIKES: &str = "hikes";
pub const USER_PROFILES: &str = "user_profiles";
pub const SOCIAL_DATA: &str = "social_data";
pub const HIKE_IMAGES: &str = "hike_images";
pub const APP_STATE: &str = "app_state";

/// Every namespace the application writes to.
pub const NAMESPACES: [&str; 5] = [HIKES, USER_PROFILES, SOCIAL_DATA, HIKE_IMAGES, APP_STATE];

/// Namespaced string key-value storage. Values are opaque to the store.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, DataManagerError>;

    /// Inserts or overwrites.
    async fn set(&self, namespace: &str, key: &str, value: String) -> Result<(), DataManagerError>;

    /// Removing a missing key is not an error.
    async fn remove(&self, namespace: &str, key: &str) -> Result<(), DataManagerError>;

    /// All entries of a namespace, ordered by key.
    async fn iterate(&self, namespace: &str) -> Result<Vec<(String, String)>, DataManagerError>;

    async fn scan_prefix(&self, namespace: &str, prefix: &str) -> Result<Vec<(String, String)>, DataManagerError> {
        let entries = self.iterate(namespace).await?;
        Ok(entries.into_iter().filter(|(key, _)| key.starts_with(prefix)).collect())
    }

    async fn clear(&self, namespace: &str) -> Result<(), DataManagerError>;
}
