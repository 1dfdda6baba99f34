use serde_json::{Map, Value};

use crate::{store::NAMESPACES, DataManager, DataManagerError};

impl DataManager {
    /// Every namespace as `{namespace: {key: value}}`. Values that are JSON are embedded as JSON.
    pub async fn export_all_data(&self) -> Result<Value, DataManagerError> {
        let mut export = Map::new();

        for namespace in NAMESPACES {
            let entries = self.store.iterate(namespace).await?;
            let entries = entries
                .into_iter()
                .map(|(key, value)| {
                    let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
                    (key, value)
                })
                .collect::<Map<_, _>>();
            export.insert(namespace.to_string(), Value::Object(entries));
        }

        Ok(Value::Object(export))
    }

    /// Replaces all data with an export. Unknown namespaces are ignored.
    /// The whole document is checked before anything is cleared, so a rejected import leaves the data as it was.
    pub async fn import_all_data(&self, data: &Value) -> Result<(), DataManagerError> {
        let Some(namespaces) = data.as_object() else {
            return Err(DataManagerError::InvalidInput("Import data must be a JSON object".to_string()));
        };

        let mut imports = Vec::new();
        for (namespace, entries) in namespaces {
            let Some(namespace) = NAMESPACES.iter().find(|known| **known == namespace.as_str()) else {
                tracing::warn!("Ignoring unknown namespace {namespace} in import");
                continue;
            };

            let Some(entries) = entries.as_object() else {
                return Err(DataManagerError::InvalidInput(format!("Namespace {namespace} must be a JSON object")));
            };
            imports.push((*namespace, entries));
        }

        self.clear_all_data().await?;

        for (namespace, entries) in imports {
            for (key, value) in entries {
                let value = match value {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                self.store.set(namespace, key, value).await?;
            }
        }

        Ok(())
    }

    pub async fn clear_all_data(&self) -> Result<(), DataManagerError> {
        for namespace in NAMESPACES {
            self.store.clear(namespace).await?;
        }
        tracing::info!("Cleared all data");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{hikes::tests::sample_record, Difficulty, HikeDetails};

    use super::*;

    #[tokio::test]
    async fn export_then_import_restores_everything() {
        let source = DataManager::in_memory();
        let user = source.create_user("anna", "anna@example.com").await.unwrap();
        let details = HikeDetails::new("Loop", "Forest", Difficulty::Easy).unwrap();
        let hike = source.save_completed_hike(sample_record(8, 2), details).await.unwrap();
        source.save_image(&hike.hike_id, &[9, 9, 9]).await.unwrap();

        let export = source.export_all_data().await.unwrap();
        assert!(export["hikes"].as_object().unwrap().len() == 1);

        let target = DataManager::in_memory();
        target.create_user("someone", "someone@example.com").await.unwrap();
        target.import_all_data(&export).await.unwrap();

        assert_eq!(target.current_user().await.unwrap().map(|u| u.uid), Some(user.uid));
        assert_eq!(target.get_hike(&hike.hike_id).await.unwrap(), hike);
        assert_eq!(target.images_for_hike(&hike.hike_id).await.unwrap().len(), 1);
        assert!(target.find_user_by_username("someone").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn import_rejects_non_objects() {
        let data_manager = DataManager::in_memory();
        assert!(data_manager.import_all_data(&Value::Array(vec![])).await.is_err());
    }

    #[tokio::test]
    async fn rejected_import_keeps_existing_data() {
        let data_manager = DataManager::in_memory();
        let user = data_manager.create_user("anna", "anna@example.com").await.unwrap();
        let details = HikeDetails::new("Loop", "Forest", Difficulty::Easy).unwrap();
        let hike = data_manager.save_completed_hike(sample_record(8, 2), details).await.unwrap();

        let bad = serde_json::json!({ "app_state": {}, "hikes": [1, 2, 3] });
        assert!(matches!(data_manager.import_all_data(&bad).await, Err(DataManagerError::InvalidInput(_))));

        assert_eq!(data_manager.get_hikes().await.unwrap().len(), 1);
        assert_eq!(data_manager.get_hike(&hike.hike_id).await.unwrap(), hike);
        assert_eq!(data_manager.all_profiles().await.unwrap().len(), 1);
        assert_eq!(data_manager.current_user().await.unwrap().map(|u| u.uid), Some(user.uid));
    }

    #[tokio::test]
    async fn clear_wipes_every_namespace() {
        let data_manager = DataManager::in_memory();
        data_manager.create_user("anna", "anna@example.com").await.unwrap();
        data_manager.clear_all_data().await.unwrap();

        assert_eq!(data_manager.current_user().await.unwrap(), None);
        assert!(data_manager.all_profiles().await.unwrap().is_empty());
    }
}
