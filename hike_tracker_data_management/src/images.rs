use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{store::HIKE_IMAGES, DataManager, DataManagerError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HikeImage {
    pub image_id: String,
    pub hike_id: String,
    /// Base64 encoded image bytes
    pub data: String,
    pub created_at: DateTime<Utc>,
}

impl HikeImage {
    pub fn bytes(&self) -> Result<Vec<u8>, DataManagerError> {
        STANDARD
            .decode(&self.data)
            .map_err(|err| DataManagerError::Serialization(format!("Image {} is not valid base64: {err}", self.image_id)))
    }
}

fn image_prefix(hike_id: &str) -> String {
    format!("img_{hike_id}_")
}

impl DataManager {
    pub async fn save_image(&self, hike_id: &str, bytes: &[u8]) -> Result<HikeImage, DataManagerError> {
        let image = HikeImage {
            image_id: format!("{}{}", image_prefix(hike_id), hex::encode(rand::random::<[u8; 8]>())),
            hike_id: hike_id.to_string(),
            data: STANDARD.encode(bytes),
            created_at: Utc::now(),
        };

        self.set_json(HIKE_IMAGES, &image.image_id, &image).await?;
        tracing::debug!("Saved image {} ({} bytes)", image.image_id, bytes.len());
        Ok(image)
    }

    pub async fn get_image(&self, image_id: &str) -> Result<Option<HikeImage>, DataManagerError> {
        self.get_json(HIKE_IMAGES, image_id).await
    }

    /// Images are keyed by their hike, so this is a prefix scan.
    pub async fn images_for_hike(&self, hike_id: &str) -> Result<Vec<HikeImage>, DataManagerError> {
        self.values_with_prefix(HIKE_IMAGES, &image_prefix(hike_id)).await
    }

    pub async fn delete_image(&self, image_id: &str) -> Result<(), DataManagerError> {
        self.store.remove(HIKE_IMAGES, image_id).await
    }
}
