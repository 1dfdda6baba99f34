use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One GPS sample as delivered by a location source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    /// Milliseconds since the unix epoch
    pub timestamp: i64,
}

impl TrackPoint {
    pub fn new(latitude: f64, longitude: f64, altitude: f64, timestamp: i64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            timestamp,
        }
    }

    /// Builds a point from a raw reading. Sources may not know the altitude, in which case it is 0.
    pub fn from_reading(latitude: f64, longitude: f64, altitude: Option<f64>, timestamp: i64) -> Self {
        Self::new(latitude, longitude, altitude.unwrap_or(0.), timestamp)
    }

    pub fn has_valid_position(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_altitude_reads_as_zero() {
        let point = TrackPoint::from_reading(56.1, 10.2, None, 1_700_000_000_000);
        assert_eq!(point.altitude, 0.);
    }

    #[test]
    fn non_finite_positions_are_invalid() {
        assert!(TrackPoint::new(56.1, 10.2, 12., 0).has_valid_position());
        assert!(!TrackPoint::new(f64::NAN, 10.2, 12., 0).has_valid_position());
        assert!(!TrackPoint::new(56.1, f64::INFINITY, 12., 0).has_valid_position());
    }

    #[test]
    fn captured_at_uses_milliseconds() {
        let point = TrackPoint::new(0., 0., 0., 1_500);
        let captured = point.captured_at().unwrap();
        assert_eq!(captured.timestamp_millis(), 1_500);
    }
}
