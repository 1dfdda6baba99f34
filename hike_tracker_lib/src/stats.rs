use serde::{Deserialize, Serialize};

use crate::hike_record::HikeRecord;

/// `HH:MM:SS`. The hour field grows past two digits for very long hikes.
pub fn format_duration(duration_sec: u64) -> String {
    let hours = duration_sec / 3600;
    let minutes = (duration_sec % 3600) / 60;
    let seconds = duration_sec % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

pub fn average_speed_kmh(distance_km: f64, duration_sec: u64) -> f64 {
    if duration_sec == 0 {
        return 0.;
    }
    distance_km / (duration_sec as f64 / 3600.)
}

/// Minutes per km, 0 when no distance has been covered.
pub fn pace_min_per_km(duration_sec: u64, distance_km: f64) -> f64 {
    if distance_km <= 0. {
        return 0.;
    }
    duration_sec as f64 / 60. / distance_km
}

/// `m:ss` rendering of a pace in minutes per km.
pub fn format_pace(pace_min_per_km: f64) -> String {
    if !pace_min_per_km.is_finite() || pace_min_per_km <= 0. {
        return "0:00".to_string();
    }
    let minutes = pace_min_per_km.floor();
    let seconds = ((pace_min_per_km - minutes) * 60.).floor();
    format!("{}:{:02}", minutes as u64, seconds as u64)
}

pub fn elevation_gain_per_km(elevation_gain_m: f64, distance_km: f64) -> f64 {
    if distance_km <= 0. {
        return 0.;
    }
    elevation_gain_m / distance_km
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Aggregates over a user's completed hikes, as shown on the profile page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PersonalRecords {
    pub total_distance_km: f64,
    pub total_elevation_gain_m: f64,
    pub total_hikes: usize,
    pub longest_hike_km: f64,
    pub highest_elevation_m: f64,
    pub best_average_speed_kmh: f64,
    pub average_distance_km: f64,
    /// Index into the input of the hike with the greatest distance
    pub best_hike: Option<usize>,
}

impl PersonalRecords {
    pub fn from_hikes<'a>(hikes: impl IntoIterator<Item = &'a HikeRecord>) -> Self {
        let mut records = PersonalRecords::default();

        for (i, hike) in hikes.into_iter().enumerate() {
            records.total_hikes += 1;
            records.total_distance_km += hike.distance_km;
            records.total_elevation_gain_m += hike.elevation_gain_m;
            records.highest_elevation_m = records.highest_elevation_m.max(hike.max_elevation_m);
            records.best_average_speed_kmh = records.best_average_speed_kmh.max(hike.average_speed_kmh());

            if records.best_hike.is_none() || hike.distance_km > records.longest_hike_km {
                records.longest_hike_km = hike.distance_km.max(records.longest_hike_km);
                records.best_hike = Some(i);
            }
        }

        if records.total_hikes > 0 {
            records.average_distance_km = records.total_distance_km / records.total_hikes as f64;
        }

        records
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn durations_are_zero_padded() {
        assert_eq!(format_duration(0), "00:00:00");
        assert_eq!(format_duration(59), "00:00:59");
        assert_eq!(format_duration(3661), "01:01:01");
        assert_eq!(format_duration(100 * 3600 + 5), "100:00:05");
    }

    #[test]
    fn zero_duration_has_zero_speed() {
        assert_eq!(average_speed_kmh(3.2, 0), 0.);
        assert_eq!(average_speed_kmh(0., 0), 0.);
    }

    #[test]
    fn speed_is_km_per_hour() {
        assert!((average_speed_kmh(5., 3600) - 5.).abs() < 1e-12);
        assert!((average_speed_kmh(2.5, 1800) - 5.).abs() < 1e-12);
    }

    #[test]
    fn pace_without_distance_renders_zero() {
        assert_eq!(pace_min_per_km(600, 0.), 0.);
        assert_eq!(format_pace(pace_min_per_km(600, 0.)), "0:00");
    }

    #[test]
    fn pace_renders_minutes_and_seconds() {
        // 25 minutes over 2 km
        let pace = pace_min_per_km(1500, 2.);
        assert!((pace - 12.5).abs() < 1e-12);
        assert_eq!(format_pace(pace), "12:30");
    }

    #[test]
    fn gain_per_km_without_distance_is_zero() {
        assert_eq!(elevation_gain_per_km(120., 0.), 0.);
        assert!((elevation_gain_per_km(120., 4.) - 30.).abs() < 1e-12);
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(0.11119, 2), 0.11);
        assert_eq!(round_to(70.04, 1), 70.);
        assert_eq!(round_to(12.345, 0), 12.);
    }

    fn hike(distance_km: f64, duration_sec: u64, gain: f64, max: f64) -> HikeRecord {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        HikeRecord {
            distance_km,
            duration_sec,
            duration_formatted: format_duration(duration_sec),
            elevation_gain_m: gain,
            max_elevation_m: max,
            path: Vec::new(),
            started_at: start,
            ended_at: start + chrono::Duration::seconds(duration_sec as i64),
        }
    }

    #[test]
    fn records_of_no_hikes_are_empty() {
        let records = PersonalRecords::from_hikes(&[]);
        assert_eq!(records, PersonalRecords::default());
    }

    #[test]
    fn records_aggregate_hikes() {
        let hikes = [hike(4., 3600, 100., 300.), hike(10., 7200, 250., 900.), hike(6., 3600, 50., 200.)];
        let records = PersonalRecords::from_hikes(&hikes);

        assert_eq!(records.total_hikes, 3);
        assert!((records.total_distance_km - 20.).abs() < 1e-12);
        assert!((records.total_elevation_gain_m - 400.).abs() < 1e-12);
        assert_eq!(records.longest_hike_km, 10.);
        assert_eq!(records.highest_elevation_m, 900.);
        assert!((records.best_average_speed_kmh - 6.).abs() < 1e-12);
        assert!((records.average_distance_km - 20. / 3.).abs() < 1e-12);
        assert_eq!(records.best_hike, Some(1));
    }
}
