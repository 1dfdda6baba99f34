use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::SessionError, geo, hike_record::HikeRecord, stats, track_point::TrackPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HikeStatus {
    Active,
    Paused,
    Completed,
}

impl fmt::Display for HikeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HikeStatus::Active => write!(f, "active"),
            HikeStatus::Paused => write!(f, "paused"),
            HikeStatus::Completed => write!(f, "completed"),
        }
    }
}

/// What the elevation of the very first sample is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FirstSampleBaseline {
    /// The first sample climbs from 0 m, so a positive first altitude counts as gain.
    #[default]
    Zero,
    /// The first sample only sets the baseline and never counts as gain.
    Reading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// The session was paused, or the sample predates the last pause.
    Ignored,
}

/// Live figures for a running hike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveStats {
    pub status: HikeStatus,
    pub points: usize,
    pub distance_km: f64,
    pub duration_sec: u64,
    pub duration_formatted: String,
    pub elevation_gain_m: f64,
    pub current_elevation_m: f64,
    pub max_elevation_m: f64,
    pub average_speed_kmh: f64,
}

/// The state of one hike from start to stop.
///
/// Samples and ticks only change the accumulators while the session is
/// active. Once stopped the session rejects every mutator.
#[derive(Debug, Clone)]
pub struct HikeSession {
    status: HikeStatus,
    baseline: FirstSampleBaseline,
    path: Vec<TrackPoint>,
    distance_km: f64,
    elevation_gain_m: f64,
    current_elevation_m: f64,
    max_elevation_m: f64,
    duration_sec: u64,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    // Samples at or before this timestamp were captured before the last pause
    resume_floor: Option<i64>,
}

impl HikeSession {
    /// Sessions are created already running.
    pub fn start(started_at: DateTime<Utc>) -> Self {
        Self::with_baseline(started_at, FirstSampleBaseline::default())
    }

    pub fn with_baseline(started_at: DateTime<Utc>, baseline: FirstSampleBaseline) -> Self {
        Self {
            status: HikeStatus::Active,
            baseline,
            path: Vec::new(),
            distance_km: 0.,
            elevation_gain_m: 0.,
            current_elevation_m: 0.,
            max_elevation_m: 0.,
            duration_sec: 0,
            started_at,
            ended_at: None,
            resume_floor: None,
        }
    }

    /// Builds a completed record from an already captured track, e.g. an imported GPX file.
    /// Invalid points are skipped. The duration is the time between the first and last valid point.
    pub fn replay(track: &[TrackPoint], baseline: FirstSampleBaseline) -> Result<HikeRecord, SessionError> {
        let timestamps = track.iter().filter(|p| p.has_valid_position()).map(|p| p.timestamp);
        let (first, last) = (timestamps.clone().min(), timestamps.max());

        let started_at = first.and_then(DateTime::<Utc>::from_timestamp_millis).unwrap_or_default();
        let ended_at = last.and_then(DateTime::<Utc>::from_timestamp_millis).unwrap_or(started_at);

        let mut session = Self::with_baseline(started_at, baseline);
        for point in track {
            if let Err(err) = session.ingest(*point) {
                tracing::debug!("Skipping point while replaying track: {err}");
            }
        }

        // Equivalent to one tick per second between the first and last point
        session.duration_sec = (ended_at - started_at).num_seconds().max(0) as u64;

        session.stop(ended_at)
    }

    pub fn ingest(&mut self, sample: TrackPoint) -> Result<Outcome, SessionError> {
        match self.status {
            HikeStatus::Completed => return Err(self.invalid_state("record a sample on")),
            HikeStatus::Paused => return Ok(Outcome::Ignored),
            HikeStatus::Active => {}
        }

        if !sample.has_valid_position() {
            return Err(SessionError::InvalidSample(format!(
                "non-finite position ({}, {})",
                sample.latitude, sample.longitude
            )));
        }

        if self.resume_floor.is_some_and(|floor| sample.timestamp <= floor) {
            tracing::debug!("Dropping sample from before the last pause ({})", sample.timestamp);
            return Ok(Outcome::Ignored);
        }

        let altitude = if sample.altitude.is_finite() { sample.altitude } else { 0. };
        let sample = TrackPoint { altitude, ..sample };

        let previous_elevation = match (self.path.is_empty(), self.baseline) {
            (true, FirstSampleBaseline::Reading) => altitude,
            _ => self.current_elevation_m,
        };

        if altitude > previous_elevation {
            self.elevation_gain_m += altitude - previous_elevation;
        }

        self.max_elevation_m = if self.path.is_empty() {
            altitude
        } else {
            self.max_elevation_m.max(altitude)
        };
        self.current_elevation_m = altitude;

        if let Some(last) = self.path.last() {
            self.distance_km += geo::segment_distance(last, &sample);
        }
        self.path.push(sample);

        Ok(Outcome::Applied)
    }

    /// One elapsed second.
    pub fn tick(&mut self) -> Result<Outcome, SessionError> {
        match self.status {
            HikeStatus::Completed => Err(self.invalid_state("tick")),
            HikeStatus::Paused => Ok(Outcome::Ignored),
            HikeStatus::Active => {
                self.duration_sec += 1;
                Ok(Outcome::Applied)
            }
        }
    }

    /// Pausing a paused session does nothing.
    pub fn pause(&mut self) -> Result<(), SessionError> {
        match self.status {
            HikeStatus::Completed => Err(self.invalid_state("pause")),
            HikeStatus::Paused => Ok(()),
            HikeStatus::Active => {
                self.status = HikeStatus::Paused;
                self.resume_floor = self.path.last().map(|p| p.timestamp).or(self.resume_floor);
                Ok(())
            }
        }
    }

    /// Resuming a running session does nothing.
    pub fn resume(&mut self) -> Result<(), SessionError> {
        match self.status {
            HikeStatus::Completed => Err(self.invalid_state("resume")),
            HikeStatus::Active => Ok(()),
            HikeStatus::Paused => {
                self.status = HikeStatus::Active;
                Ok(())
            }
        }
    }

    /// Freezes the session and hands out the finished record. Persisting it is up to the caller.
    pub fn stop(&mut self, ended_at: DateTime<Utc>) -> Result<HikeRecord, SessionError> {
        if self.status == HikeStatus::Completed {
            return Err(self.invalid_state("stop"));
        }

        self.status = HikeStatus::Completed;
        self.ended_at = Some(ended_at);

        Ok(HikeRecord {
            distance_km: stats::round_to(self.distance_km, 2),
            duration_sec: self.duration_sec,
            duration_formatted: stats::format_duration(self.duration_sec),
            elevation_gain_m: stats::round_to(self.elevation_gain_m, 1),
            max_elevation_m: stats::round_to(self.max_elevation_m, 1),
            path: self.path.clone(),
            started_at: self.started_at,
            ended_at,
        })
    }

    pub fn live_stats(&self) -> LiveStats {
        LiveStats {
            status: self.status,
            points: self.path.len(),
            distance_km: self.distance_km,
            duration_sec: self.duration_sec,
            duration_formatted: stats::format_duration(self.duration_sec),
            elevation_gain_m: self.elevation_gain_m,
            current_elevation_m: self.current_elevation_m,
            max_elevation_m: self.max_elevation_m,
            average_speed_kmh: stats::average_speed_kmh(self.distance_km, self.duration_sec),
        }
    }

    fn invalid_state(&self, operation: &'static str) -> SessionError {
        SessionError::InvalidState {
            operation,
            status: self.status,
        }
    }

    pub fn status(&self) -> HikeStatus {
        self.status
    }

    pub fn path(&self) -> &[TrackPoint] {
        &self.path
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_km
    }

    pub fn elevation_gain_m(&self) -> f64 {
        self.elevation_gain_m
    }

    pub fn current_elevation_m(&self) -> f64 {
        self.current_elevation_m
    }

    pub fn max_elevation_m(&self) -> f64 {
        self.max_elevation_m
    }

    pub fn duration_sec(&self) -> u64 {
        self.duration_sec
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }
}
