use std::{path::Path, str::FromStr};

use async_trait::async_trait;
use chrono::Utc;
use const_format::concatcp;
use sqlx::{query, query_as, sqlite::{SqliteConnectOptions, SqlitePoolOptions}, Executor, Pool, Sqlite, SqlitePool};

use crate::DataManagerError;

use super::{constants::*, PersistenceStore};

/// Key-value store backed by a single SQLite table keyed on (namespace, key).
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub async fn connect(path: &Path) -> Result<Self, DataManagerError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await
            .map_err(|err| DataManagerError::Database(format!("Failed to connect to database {:?}: {err}", path)))?;

        let store = Self { pool };
        store.init().await?;

        tracing::debug!("Connected to database at {:?}", path);
        Ok(store)
    }

    /// Private database that lives as long as the store.
    pub async fn connect_in_memory() -> Result<Self, DataManagerError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|err| DataManagerError::Database(format!("Invalid connection string: {err}")))?;

        // Every connection to :memory: is its own database, so keep exactly one alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options).await
            .map_err(|err| DataManagerError::Database(format!("Failed to open in-memory database: {err}")))?;

        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<(), DataManagerError> {
        self.pool.execute(concatcp!("
            CREATE TABLE IF NOT EXISTS ", KEY_VALUES_TABLE_NAME, "(",
                NAMESPACE,  " TEXT NOT NULL,",
                KEY,        " TEXT NOT NULL,",
                VALUE,      " TEXT NOT NULL,",
                UPDATED_AT, " TIMESTAMP NOT NULL,
                PRIMARY KEY(", NAMESPACE, ", ", KEY, ")
            )")).await
            .map_err(|err| DataManagerError::Database(format!("Failed to create tables: {err}")))
            .map(|_| ())
    }
}

#[async_trait]
impl PersistenceStore for SqliteStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, DataManagerError> {
        query_as::<_, (String,)>(concatcp!("SELECT ", VALUE, " FROM ", KEY_VALUES_TABLE_NAME, " WHERE ", NAMESPACE, " = ?1 AND ", KEY, " = ?2"))
            .bind(namespace)
            .bind(key)
            .fetch_optional(&self.pool).await
            .map_err(|err| DataManagerError::Database(format!("Failed to get {namespace}/{key}: {err}")))
            .map(|row| row.map(|row| row.0))
    }

    async fn set(&self, namespace: &str, key: &str, value: String) -> Result<(), DataManagerError> {
        query(concatcp!("
            INSERT INTO ", KEY_VALUES_TABLE_NAME, "(", NAMESPACE, ", ", KEY, ", ", VALUE, ", ", UPDATED_AT, ")
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(", NAMESPACE, ", ", KEY, ") DO UPDATE SET ",
                VALUE, " = excluded.", VALUE, ", ",
                UPDATED_AT, " = excluded.", UPDATED_AT))
            .bind(namespace)
            .bind(key)
            .bind(value)
            .bind(Utc::now())
            .execute(&self.pool).await
            .map_err(|err| DataManagerError::Database(format!("Failed to set {namespace}/{key}: {err}")))
            .map(|_| ())
    }

    async fn remove(&self, namespace: &str, key: &str) -> Result<(), DataManagerError> {
        query(concatcp!("DELETE FROM ", KEY_VALUES_TABLE_NAME, " WHERE ", NAMESPACE, " = ?1 AND ", KEY, " = ?2"))
            .bind(namespace)
            .bind(key)
            .execute(&self.pool).await
            .map_err(|err| DataManagerError::Database(format!("Failed to remove {namespace}/{key}: {err}")))
            .map(|_| ())
    }

    async fn iterate(&self, namespace: &str) -> Result<Vec<(String, String)>, DataManagerError> {
        query_as::<_, (String, String)>(concatcp!("SELECT ", KEY, ", ", VALUE, " FROM ", KEY_VALUES_TABLE_NAME, " WHERE ", NAMESPACE, " = ?1 ORDER BY ", KEY))
            .bind(namespace)
            .fetch_all(&self.pool).await
            .map_err(|err| DataManagerError::Database(format!("Failed to read namespace {namespace}: {err}")))
    }

    async fn scan_prefix(&self, namespace: &str, prefix: &str) -> Result<Vec<(String, String)>, DataManagerError> {
        // Range scan on the primary key. Text compares bytewise, and no key char sorts after U+10FFFF
        let upper = format!("{prefix}\u{10FFFF}");
        query_as::<_, (String, String)>(concatcp!(
            "SELECT ", KEY, ", ", VALUE, " FROM ", KEY_VALUES_TABLE_NAME,
            " WHERE ", NAMESPACE, " = ?1 AND ", KEY, " >= ?2 AND ", KEY, " < ?3 ORDER BY ", KEY))
            .bind(namespace)
            .bind(prefix)
            .bind(upper)
            .fetch_all(&self.pool).await
            .map_err(|err| DataManagerError::Database(format!("Failed to scan {namespace}/{prefix}: {err}")))
    }

    async fn clear(&self, namespace: &str) -> Result<(), DataManagerError> {
        query(concatcp!("DELETE FROM ", KEY_VALUES_TABLE_NAME, " WHERE ", NAMESPACE, " = ?1"))
            .bind(namespace)
            .execute(&self.pool).await
            .map_err(|err| DataManagerError::Database(format!("Failed to clear namespace {namespace}: {err}")))
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sqlite_store_behaves_like_a_store() {
        let store = SqliteStore::connect_in_memory().await.unwrap();
        crate::store::tests::exercise_store(&store).await;
    }

    #[tokio::test]
    async fn data_survives_reconnecting() {
        let dir = std::env::temp_dir().join(format!("hike_tracker_test_{}", hex::encode(rand::random::<[u8; 6]>())));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("store.db");

        {
            let store = SqliteStore::connect(&path).await.unwrap();
            store.set("hikes", "hike_1", "{}".into()).await.unwrap();
            store.pool.close().await;
        }

        let store = SqliteStore::connect(&path).await.unwrap();
        assert_eq!(store.get("hikes", "hike_1").await.unwrap(), Some("{}".to_string()));

        store.pool.close().await;
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
