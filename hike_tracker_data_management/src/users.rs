use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{data_manager::generate_id, store::{APP_STATE, USER_PROFILES}, DataManager, DataManagerError};

const CURRENT_USER_KEY: &str = "current_user_id";
const DEFAULT_BIO: &str = "Hike tracker user";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub uid: String,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub bio: String,
    pub profile_pic: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub has_seen_tutorial: bool,
    pub total_distance_km: f64,
    pub total_hikes: u32,
    pub total_elevation_m: f64,
}

/// The logged-in identity, handed to the parts that act on behalf of a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub uid: String,
    pub username: String,
}

impl UserProfile {
    pub fn context(&self) -> UserContext {
        UserContext {
            uid: self.uid.clone(),
            username: self.username.clone(),
        }
    }
}

fn profile_key(uid: &str) -> String {
    format!("user:{uid}")
}

impl DataManager {
    /// Creates a profile and logs it in.
    pub async fn create_user(&self, username: &str, email: &str) -> Result<UserProfile, DataManagerError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(DataManagerError::InvalidInput("Username must not be empty".to_string()));
        }

        if self.find_user_by_username(username).await?.is_some() {
            return Err(DataManagerError::InvalidInput(format!("Username {username} is taken")));
        }

        let now = Utc::now();
        let profile = UserProfile {
            uid: generate_id("user"),
            username: username.to_string(),
            email: email.trim().to_string(),
            display_name: username.to_string(),
            bio: DEFAULT_BIO.to_string(),
            profile_pic: None,
            created_at: now,
            last_updated: now,
            has_seen_tutorial: false,
            total_distance_km: 0.,
            total_hikes: 0,
            total_elevation_m: 0.,
        };

        self.save_profile(&profile).await?;
        self.store.set(APP_STATE, CURRENT_USER_KEY, profile.uid.clone()).await?;

        tracing::info!("Created user {} ({})", profile.username, profile.uid);
        Ok(profile)
    }

    /// Local login. Keeps the current user if one is logged in, otherwise
    /// logs in the profile with this email or creates one named after the email's local part.
    /// A taken name gets the first free numeric suffix, so `anna` becomes `anna2`.
    pub async fn sign_in(&self, email: &str) -> Result<UserProfile, DataManagerError> {
        if let Some(profile) = self.current_user().await? {
            return Ok(profile);
        }

        let email = email.trim();
        let existing = self.all_profiles().await?.into_iter().find(|p| p.email.eq_ignore_ascii_case(email));
        if let Some(profile) = existing {
            self.store.set(APP_STATE, CURRENT_USER_KEY, profile.uid.clone()).await?;
            return Ok(profile);
        }

        let base = email.split('@').next().map(str::trim).filter(|part| !part.is_empty()).unwrap_or("hiker");
        let mut username = base.to_string();
        let mut suffix = 2;
        while self.find_user_by_username(&username).await?.is_some() {
            username = format!("{base}{suffix}");
            suffix += 1;
        }

        self.create_user(&username, email).await
    }

    pub async fn sign_out(&self) -> Result<(), DataManagerError> {
        self.store.remove(APP_STATE, CURRENT_USER_KEY).await
    }

    pub async fn current_user(&self) -> Result<Option<UserProfile>, DataManagerError> {
        let Some(uid) = self.store.get(APP_STATE, CURRENT_USER_KEY).await? else {
            return Ok(None);
        };
        self.get_profile(&uid).await
    }

    pub async fn require_current_user(&self) -> Result<UserProfile, DataManagerError> {
        self.current_user().await?.ok_or(DataManagerError::NotLoggedIn)
    }

    pub async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>, DataManagerError> {
        self.get_json(USER_PROFILES, &profile_key(uid)).await
    }

    pub async fn save_profile(&self, profile: &UserProfile) -> Result<(), DataManagerError> {
        let mut profile = profile.clone();
        profile.last_updated = Utc::now();
        self.set_json(USER_PROFILES, &profile_key(&profile.uid), &profile).await
    }

    pub async fn all_profiles(&self) -> Result<Vec<UserProfile>, DataManagerError> {
        self.values_with_prefix(USER_PROFILES, "user:").await
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<UserProfile>, DataManagerError> {
        Ok(self.all_profiles().await?.into_iter().find(|p| p.username == username))
    }

    /// Case-insensitive substring search over known usernames.
    pub async fn search_users(&self, term: &str) -> Result<Vec<UserProfile>, DataManagerError> {
        let term = term.to_lowercase();
        Ok(self
            .all_profiles()
            .await?
            .into_iter()
            .filter(|p| p.username.to_lowercase().contains(&term))
            .collect())
    }

    pub async fn mark_tutorial_seen(&self) -> Result<UserProfile, DataManagerError> {
        let mut profile = self.require_current_user().await?;
        profile.has_seen_tutorial = true;
        self.save_profile(&profile).await?;
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_user_logs_in() {
        let data_manager = DataManager::in_memory();
        assert_eq!(data_manager.current_user().await.unwrap(), None);

        let profile = data_manager.create_user("trail_master", "tm@example.com").await.unwrap();
        assert!(profile.uid.starts_with("user_"));
        assert_eq!(profile.display_name, "trail_master");
        assert!(!profile.has_seen_tutorial);

        let current = data_manager.current_user().await.unwrap().unwrap();
        assert_eq!(current.uid, profile.uid);
    }

    #[tokio::test]
    async fn usernames_are_unique_and_non_empty() {
        let data_manager = DataManager::in_memory();
        data_manager.create_user("anna", "a@example.com").await.unwrap();

        assert!(matches!(data_manager.create_user("anna", "b@example.com").await, Err(DataManagerError::InvalidInput(_))));
        assert!(matches!(data_manager.create_user("  ", "c@example.com").await, Err(DataManagerError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn sign_in_uses_the_email_local_part() {
        let data_manager = DataManager::in_memory();
        let profile = data_manager.sign_in("mountain_lover@example.com").await.unwrap();
        assert_eq!(profile.username, "mountain_lover");

        // Already logged in
        let again = data_manager.sign_in("someone_else@example.com").await.unwrap();
        assert_eq!(again.uid, profile.uid);

        data_manager.sign_out().await.unwrap();
        assert!(matches!(data_manager.require_current_user().await, Err(DataManagerError::NotLoggedIn)));

        // Known email logs back into the same profile
        let back = data_manager.sign_in("MOUNTAIN_LOVER@example.com").await.unwrap();
        assert_eq!(back.uid, profile.uid);
    }

    #[tokio::test]
    async fn sign_in_picks_a_free_username() {
        let data_manager = DataManager::in_memory();
        let first = data_manager.sign_in("anna@example.com").await.unwrap();
        data_manager.sign_out().await.unwrap();
        data_manager.create_user("anna2", "anna2@example.com").await.unwrap();
        data_manager.sign_out().await.unwrap();

        let other = data_manager.sign_in("anna@other.com").await.unwrap();
        assert_eq!(other.username, "anna3");
        assert_eq!(other.email, "anna@other.com");
        assert_ne!(other.uid, first.uid);

        data_manager.sign_out().await.unwrap();
        let nameless = data_manager.sign_in("@example.com").await.unwrap();
        assert_eq!(nameless.username, "hiker");
    }

    #[tokio::test]
    async fn tutorial_flag_is_persisted() {
        let data_manager = DataManager::in_memory();
        assert!(matches!(data_manager.mark_tutorial_seen().await, Err(DataManagerError::NotLoggedIn)));

        let profile = data_manager.create_user("hiker_john", "john@example.com").await.unwrap();
        data_manager.mark_tutorial_seen().await.unwrap();

        let stored = data_manager.get_profile(&profile.uid).await.unwrap().unwrap();
        assert!(stored.has_seen_tutorial);
    }

    #[tokio::test]
    async fn search_is_case_insensitive() {
        let data_manager = DataManager::in_memory();
        data_manager.create_user("Trail_Master", "t@example.com").await.unwrap();
        data_manager.create_user("hiker_john", "j@example.com").await.unwrap();

        let found = data_manager.search_users("TRAIL").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].username, "Trail_Master");
        assert_eq!(data_manager.search_users("").await.unwrap().len(), 2);
    }
}
