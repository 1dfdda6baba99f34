use std::{fmt, str::FromStr};

use hike_tracker_lib::{hike_record::HikeRecord, stats::PersonalRecords};
use serde::{Deserialize, Serialize};

use crate::{data_manager::generate_id, store::HIKES, DataManager, DataManagerError, UserContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Easy,
    Moderate,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Moderate => write!(f, "moderate"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

impl FromStr for Difficulty {
    type Err = DataManagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "moderate" => Ok(Difficulty::Moderate),
            "hard" => Ok(Difficulty::Hard),
            other => Err(DataManagerError::InvalidInput(format!("Unknown difficulty: {other}"))),
        }
    }
}

/// What the user fills in after stopping a hike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HikeDetails {
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub image_id: Option<String>,
}

impl HikeDetails {
    /// Title and description are required.
    pub fn new(title: &str, description: &str, difficulty: Difficulty) -> Result<Self, DataManagerError> {
        if title.trim().is_empty() || description.trim().is_empty() {
            return Err(DataManagerError::InvalidInput("A hike needs a title and a description".to_string()));
        }

        Ok(Self {
            title: title.trim().to_string(),
            description: description.trim().to_string(),
            difficulty,
            image_id: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedHike {
    pub hike_id: String,
    /// uid of the user who walked it
    pub owner: Option<String>,
    pub details: HikeDetails,
    pub record: HikeRecord,
}

fn hike_key(hike_id: &str) -> String {
    format!("hike:{hike_id}")
}

impl DataManager {
    /// Stores a finished hike for the logged-in user, if any.
    pub async fn save_completed_hike(&self, record: HikeRecord, details: HikeDetails) -> Result<CompletedHike, DataManagerError> {
        let owner = self.current_user().await?.map(|profile| profile.context());
        self.save_completed_hike_for(owner.as_ref(), record, details).await
    }

    /// Stores a finished hike on behalf of `owner` and adds it to their profile totals.
    pub async fn save_completed_hike_for(&self, owner: Option<&UserContext>, record: HikeRecord, details: HikeDetails) -> Result<CompletedHike, DataManagerError> {
        let hike = CompletedHike {
            hike_id: generate_id("hike"),
            owner: owner.map(|user| user.uid.clone()),
            details,
            record,
        };

        self.set_json(HIKES, &hike_key(&hike.hike_id), &hike).await?;

        if let Some(mut profile) = match owner {
            Some(user) => self.get_profile(&user.uid).await?,
            None => None,
        } {
            profile.total_distance_km += hike.record.distance_km;
            profile.total_elevation_m += hike.record.elevation_gain_m;
            profile.total_hikes += 1;
            self.save_profile(&profile).await?;
        }

        tracing::info!("Saved hike {} ({:.2} km)", hike.hike_id, hike.record.distance_km);
        Ok(hike)
    }

    pub async fn update_hike_details(&self, hike_id: &str, details: HikeDetails) -> Result<CompletedHike, DataManagerError> {
        let mut hike = self.get_hike(hike_id).await?;
        hike.details = details;
        self.set_json(HIKES, &hike_key(hike_id), &hike).await?;
        Ok(hike)
    }

    pub async fn get_hike(&self, hike_id: &str) -> Result<CompletedHike, DataManagerError> {
        self.get_json(HIKES, &hike_key(hike_id))
            .await?
            .ok_or_else(|| DataManagerError::NotFound(format!("No hike with id {hike_id}")))
    }

    /// Newest first.
    pub async fn get_hikes(&self) -> Result<Vec<CompletedHike>, DataManagerError> {
        let mut hikes: Vec<CompletedHike> = self.values_with_prefix(HIKES, "hike:").await?;
        hikes.sort_by(|a, b| b.record.started_at.cmp(&a.record.started_at).then_with(|| a.hike_id.cmp(&b.hike_id)));
        Ok(hikes)
    }

    pub async fn get_user_hikes(&self, uid: &str) -> Result<Vec<CompletedHike>, DataManagerError> {
        let hikes = self.get_hikes().await?;
        Ok(hikes.into_iter().filter(|hike| hike.owner.as_deref() == Some(uid)).collect())
    }

    pub async fn delete_hike(&self, hike_id: &str) -> Result<(), DataManagerError> {
        let hike = self.get_hike(hike_id).await?;

        for image in self.images_for_hike(hike_id).await? {
            self.delete_image(&image.image_id).await?;
        }
        self.store.remove(HIKES, &hike_key(hike_id)).await?;

        if let Some(mut profile) = match &hike.owner {
            Some(uid) => self.get_profile(uid).await?,
            None => None,
        } {
            profile.total_distance_km = (profile.total_distance_km - hike.record.distance_km).max(0.);
            profile.total_elevation_m = (profile.total_elevation_m - hike.record.elevation_gain_m).max(0.);
            profile.total_hikes = profile.total_hikes.saturating_sub(1);
            self.save_profile(&profile).await?;
        }

        Ok(())
    }

    /// Records over the given hikes, with the hike that has the greatest distance.
    pub fn personal_records(hikes: &[CompletedHike]) -> (PersonalRecords, Option<&CompletedHike>) {
        let records = PersonalRecords::from_hikes(hikes.iter().map(|hike| &hike.record));
        let best = records.best_hike.and_then(|i| hikes.get(i));
        (records, best)
    }
}
