use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{stats, track_point::TrackPoint};

/// The frozen result of a stopped hike session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HikeRecord {
    /// Rounded to 2 decimals
    pub distance_km: f64,
    pub duration_sec: u64,
    /// `HH:MM:SS`
    pub duration_formatted: String,
    /// Rounded to 1 decimal
    pub elevation_gain_m: f64,
    /// Rounded to 1 decimal
    pub max_elevation_m: f64,
    pub path: Vec<TrackPoint>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl HikeRecord {
    pub fn average_speed_kmh(&self) -> f64 {
        stats::average_speed_kmh(self.distance_km, self.duration_sec)
    }

    pub fn pace_min_per_km(&self) -> f64 {
        stats::pace_min_per_km(self.duration_sec, self.distance_km)
    }

    pub fn formatted_pace(&self) -> String {
        stats::format_pace(self.pace_min_per_km())
    }

    pub fn elevation_gain_per_km(&self) -> f64 {
        stats::elevation_gain_per_km(self.elevation_gain_m, self.distance_km)
    }
}
