use std::{fs::File, io::BufReader, path::Path, sync::{atomic::{AtomicUsize, Ordering}, Arc}, time::Duration};

use chrono::Utc;
use hike_tracker_data_management::gpx_util;
use hike_tracker_lib::{error::SessionError, track_point::TrackPoint};

use crate::subscription::{EventKind, EventSink, SubscriptionHandle};

/// Delivers position fixes while subscribed.
pub trait LocationSource: Send + Sync {
    fn subscribe(&self, sink: EventSink) -> SubscriptionHandle;
}

/// Plays back a fixed list of readings, one per interval.
///
/// The position in the list survives re-subscribing, so a paused and resumed
/// hike continues where it left off.
#[derive(Clone)]
pub struct ScriptedSource {
    readings: Arc<Vec<Result<TrackPoint, SessionError>>>,
    cursor: Arc<AtomicUsize>,
    interval: Duration,
    restamp: bool,
}

impl ScriptedSource {
    pub fn new(readings: Vec<Result<TrackPoint, SessionError>>, interval: Duration) -> Self {
        Self {
            readings: Arc::new(readings),
            cursor: Arc::new(AtomicUsize::new(0)),
            interval,
            restamp: false,
        }
    }

    pub fn from_points(points: Vec<TrackPoint>, interval: Duration) -> Self {
        Self::new(points.into_iter().map(Ok).collect(), interval)
    }

    /// Readings left to deliver.
    pub fn remaining(&self) -> usize {
        self.readings.len().saturating_sub(self.cursor.load(Ordering::Acquire))
    }
}

impl LocationSource for ScriptedSource {
    fn subscribe(&self, sink: EventSink) -> SubscriptionHandle {
        let source = self.clone();

        SubscriptionHandle::spawn(sink, move |sink| async move {
            loop {
                let index = source.cursor.load(Ordering::Acquire);
                let Some(reading) = source.readings.get(index) else {
                    tracing::debug!("Location source exhausted after {index} readings");
                    break;
                };

                if !source.interval.is_zero() {
                    tokio::time::sleep(source.interval).await;
                }

                let kind = match reading {
                    Ok(point) if source.restamp => EventKind::Sample(TrackPoint {
                        timestamp: Utc::now().timestamp_millis(),
                        ..*point
                    }),
                    Ok(point) => EventKind::Sample(*point),
                    Err(err) => EventKind::SourceError(err.clone()),
                };

                if !sink.send(kind) {
                    break;
                }
                source.cursor.fetch_add(1, Ordering::AcqRel);
            }
        })
    }
}

/// Replays the points of a GPX file as if they were live fixes, stamped with the current time.
#[derive(Clone)]
pub struct GpxReplaySource {
    inner: ScriptedSource,
    name: Option<String>,
}

impl GpxReplaySource {
    pub fn open(path: &Path, interval: Duration) -> Result<Self, SessionError> {
        let file = File::open(path)
            .map_err(|err| SessionError::SourceUnavailable(format!("Cannot open {:?}: {err}", path)))?;
        let track = gpx_util::read_gpx(BufReader::new(file))
            .map_err(|err| SessionError::SourceUnavailable(err.to_string()))?;

        if track.points.is_empty() {
            return Err(SessionError::SourceUnavailable(format!("{:?} has no track points", path)));
        }

        tracing::info!("Replaying {} points from {:?}", track.points.len(), path);

        let mut inner = ScriptedSource::from_points(track.points, interval);
        inner.restamp = true;

        Ok(Self {
            inner,
            name: track.name,
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn remaining(&self) -> usize {
        self.inner.remaining()
    }
}

impl LocationSource for GpxReplaySource {
    fn subscribe(&self, sink: EventSink) -> SubscriptionHandle {
        self.inner.subscribe(sink)
    }
}
