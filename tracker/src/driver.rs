use std::sync::Arc;

use chrono::Utc;
use hike_tracker_lib::{
    error::SessionError,
    hike_record::HikeRecord,
    hike_session::{FirstSampleBaseline, HikeSession, HikeStatus, LiveStats, Outcome},
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::{
    clock::Clock,
    location::LocationSource,
    subscription::{EventKind, EventSink, Generation, SubscriptionHandle, TrackerEvent},
};

/// Owns one hike session and feeds it from a location source and a clock.
///
/// Producers run as tasks and message-pass their events back over a channel.
/// The driver handles them one at a time, so the session itself is never shared.
/// Pausing and stopping cancel the producers before returning, and any event
/// that was already in flight is dropped by its stale generation.
pub struct SessionDriver {
    session: HikeSession,
    location: Arc<dyn LocationSource>,
    clock: Arc<dyn Clock>,
    generation: Generation,
    tx: UnboundedSender<TrackerEvent>,
    rx: UnboundedReceiver<TrackerEvent>,
    subscriptions: Vec<SubscriptionHandle>,
    rejected_samples: usize,
    source_errors: Vec<SessionError>,
}

impl SessionDriver {
    /// Starts a session and subscribes to both producers. Must be called within a tokio runtime.
    pub fn start(location: Arc<dyn LocationSource>, clock: Arc<dyn Clock>, baseline: FirstSampleBaseline) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut driver = Self {
            session: HikeSession::with_baseline(Utc::now(), baseline),
            location,
            clock,
            generation: 0,
            tx,
            rx,
            subscriptions: Vec::new(),
            rejected_samples: 0,
            source_errors: Vec::new(),
        };

        driver.subscribe();
        tracing::info!("Hike started");
        driver
    }

    fn subscribe(&mut self) {
        self.generation += 1;
        self.subscriptions = vec![
            self.location.subscribe(EventSink::new(self.generation, self.tx.clone())),
            self.clock.subscribe(EventSink::new(self.generation, self.tx.clone())),
        ];
    }

    fn unsubscribe(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.cancel();
        }
    }

    /// Waits for the next event from any producer.
    pub async fn next_event(&mut self) -> Option<TrackerEvent> {
        self.rx.recv().await
    }

    /// Applies one event to the session.
    /// Invalid samples and source errors never fail the session, they are logged and counted.
    pub fn handle(&mut self, event: TrackerEvent) -> Outcome {
        if event.generation != self.generation || self.session.status() != HikeStatus::Active {
            tracing::trace!("Dropping stale event from generation {}", event.generation);
            return Outcome::Ignored;
        }

        let result = match event.kind {
            EventKind::Sample(sample) => self.session.ingest(sample),
            EventKind::Tick => self.session.tick(),
            EventKind::SourceError(err) => {
                tracing::warn!("Location source error: {err}");
                self.source_errors.push(err);
                return Outcome::Ignored;
            }
        };

        match result {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!("Rejected event: {err}");
                if matches!(err, SessionError::InvalidSample(_)) {
                    self.rejected_samples += 1;
                }
                Outcome::Ignored
            }
        }
    }

    /// Handles every event that is already queued, without waiting. Returns how many were applied.
    pub fn process_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.rx.try_recv() {
            if self.handle(event) == Outcome::Applied {
                applied += 1;
            }
        }
        applied
    }

    pub fn pause(&mut self) -> Result<(), SessionError> {
        if self.session.status() == HikeStatus::Active {
            self.unsubscribe();
        }
        self.session.pause()?;
        tracing::info!("Hike paused at {}", self.session.live_stats().duration_formatted);
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), SessionError> {
        if self.session.status() != HikeStatus::Paused {
            return self.session.resume();
        }

        self.session.resume()?;
        self.subscribe();
        tracing::info!("Hike resumed");
        Ok(())
    }

    /// Cancels the producers and freezes the session. Persisting the record is up to the caller.
    pub fn stop(&mut self) -> Result<HikeRecord, SessionError> {
        self.unsubscribe();
        let record = self.session.stop(Utc::now())?;
        tracing::info!("Hike stopped after {} with {:.2} km", record.duration_formatted, record.distance_km);
        Ok(record)
    }

    pub fn snapshot(&self) -> LiveStats {
        self.session.live_stats()
    }

    pub fn status(&self) -> HikeStatus {
        self.session.status()
    }

    pub fn session(&self) -> &HikeSession {
        &self.session
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn rejected_samples(&self) -> usize {
        self.rejected_samples
    }

    /// Source errors reported since the last call.
    pub fn take_source_errors(&mut self) -> Vec<SessionError> {
        std::mem::take(&mut self.source_errors)
    }
}

impl Drop for SessionDriver {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hike_tracker_lib::track_point::TrackPoint;

    use crate::{clock::ManualClock, location::ScriptedSource};

    use super::*;

    fn point(longitude: f64, altitude: f64, timestamp: i64) -> TrackPoint {
        TrackPoint::new(0., longitude, altitude, timestamp)
    }

    fn driver_with(readings: Vec<Result<TrackPoint, SessionError>>, baseline: FirstSampleBaseline) -> (SessionDriver, ManualClock) {
        let clock = ManualClock::new();
        let source = ScriptedSource::new(readings, Duration::ZERO);
        let driver = SessionDriver::start(Arc::new(source), Arc::new(clock.clone()), baseline);
        (driver, clock)
    }

    async fn handle_next(driver: &mut SessionDriver, count: usize) {
        for _ in 0..count {
            let event = driver.next_event().await.unwrap();
            driver.handle(event);
        }
    }

    #[tokio::test]
    async fn samples_and_ticks_reach_the_session() {
        let (mut driver, clock) = driver_with(
            vec![Ok(point(0., 0., 0)), Ok(point(0.001, 0., 1000))],
            FirstSampleBaseline::Zero,
        );

        handle_next(&mut driver, 2).await;
        clock.advance(4);
        assert_eq!(driver.process_pending(), 4);

        let stats = driver.snapshot();
        assert_eq!(stats.points, 2);
        assert!((stats.distance_km - 0.1112).abs() < 1e-4);
        assert_eq!(stats.duration_formatted, "00:00:04");
        assert_eq!(stats.elevation_gain_m, 0.);
    }

    #[tokio::test]
    async fn elevation_gain_over_a_climb() {
        let readings = vec![Ok(point(0., 100., 0)), Ok(point(0.001, 80., 1000)), Ok(point(0.002, 150., 2000))];

        let (mut driver, _clock) = driver_with(readings.clone(), FirstSampleBaseline::Reading);
        handle_next(&mut driver, 3).await;
        assert_eq!(driver.stop().unwrap().elevation_gain_m, 70.);

        let (mut driver, _clock) = driver_with(readings, FirstSampleBaseline::Zero);
        handle_next(&mut driver, 3).await;
        assert_eq!(driver.stop().unwrap().elevation_gain_m, 170.);
    }

    #[tokio::test]
    async fn paused_time_is_not_counted() {
        let (mut driver, clock) = driver_with(vec![], FirstSampleBaseline::Zero);

        clock.advance(10);
        driver.process_pending();
        driver.pause().unwrap();
        assert_eq!(clock.subscribers(), 0);

        clock.advance(5);
        driver.process_pending();
        driver.resume().unwrap();
        assert_eq!(driver.generation(), 2);

        assert_eq!(driver.snapshot().duration_sec, 10);
        clock.advance(1);
        driver.process_pending();
        assert_eq!(driver.snapshot().duration_sec, 11);
    }

    #[tokio::test]
    async fn in_flight_events_are_dropped_after_pause() {
        let (mut driver, clock) = driver_with(vec![], FirstSampleBaseline::Zero);

        // Queued but not yet handled when the pause arrives
        clock.advance(3);
        driver.pause().unwrap();
        driver.resume().unwrap();

        assert_eq!(driver.process_pending(), 0);
        assert_eq!(driver.snapshot().duration_sec, 0);
    }

    #[tokio::test]
    async fn pausing_twice_is_a_no_op() {
        let (mut driver, _clock) = driver_with(vec![], FirstSampleBaseline::Zero);
        driver.pause().unwrap();
        driver.pause().unwrap();
        assert_eq!(driver.status(), HikeStatus::Paused);

        driver.resume().unwrap();
        driver.resume().unwrap();
        assert_eq!(driver.generation(), 2);
        assert_eq!(driver.status(), HikeStatus::Active);
    }

    #[tokio::test]
    async fn invalid_samples_and_source_errors_keep_the_session_alive() {
        let (mut driver, _clock) = driver_with(
            vec![
                Ok(point(0., 10., 0)),
                Ok(TrackPoint::new(f64::NAN, 0., 0., 500)),
                Err(SessionError::SourceUnavailable("permission denied".into())),
                Ok(point(0.001, 12., 1000)),
            ],
            FirstSampleBaseline::Zero,
        );

        handle_next(&mut driver, 4).await;

        assert_eq!(driver.status(), HikeStatus::Active);
        assert_eq!(driver.snapshot().points, 2);
        assert_eq!(driver.rejected_samples(), 1);
        assert_eq!(driver.take_source_errors().len(), 1);
        assert!(driver.take_source_errors().is_empty());
    }

    #[tokio::test]
    async fn stop_freezes_the_session() {
        let (mut driver, clock) = driver_with(vec![Ok(point(0., 5., 0))], FirstSampleBaseline::Zero);
        handle_next(&mut driver, 1).await;
        clock.advance(2);
        driver.process_pending();

        let record = driver.stop().unwrap();
        assert_eq!(record.duration_formatted, "00:00:02");
        assert_eq!(driver.status(), HikeStatus::Completed);

        clock.advance(3);
        assert_eq!(driver.process_pending(), 0);
        assert!(matches!(driver.stop(), Err(SessionError::InvalidState { .. })));
        assert!(driver.pause().is_err());
        assert_eq!(driver.snapshot().duration_sec, 2);
    }
}
