use std::{future::Future, sync::{atomic::{AtomicBool, Ordering}, Arc}};

use hike_tracker_lib::{error::SessionError, track_point::TrackPoint};
use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle};

/// Every (re)subscription of the driver gets a new generation.
pub type Generation = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Sample(TrackPoint),
    Tick,
    SourceError(SessionError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerEvent {
    pub generation: Generation,
    pub kind: EventKind,
}

/// The sending half handed to a location source or clock.
#[derive(Clone)]
pub struct EventSink {
    generation: Generation,
    tx: UnboundedSender<TrackerEvent>,
    cancelled: Arc<AtomicBool>,
}

impl EventSink {
    pub fn new(generation: Generation, tx: UnboundedSender<TrackerEvent>) -> Self {
        Self {
            generation,
            tx,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns false once the subscription is cancelled or the driver is gone.
    /// Producers should stop when that happens.
    pub fn send(&self, kind: EventKind) -> bool {
        if self.is_cancelled() {
            return false;
        }

        self.tx
            .send(TrackerEvent {
                generation: self.generation,
                kind,
            })
            .is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }
}

/// A running producer. Dropping the handle cancels it.
pub struct SubscriptionHandle {
    cancelled: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    /// Runs `producer` on the tokio runtime until it returns or the handle is cancelled.
    pub fn spawn<F, Fut>(sink: EventSink, producer: F) -> Self
    where
        F: FnOnce(EventSink) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancelled = sink.cancelled.clone();
        let task = tokio::spawn(producer(sink));

        Self {
            cancelled,
            task: Some(task),
        }
    }

    /// For producers that push into the sink from the outside instead of running a task.
    pub fn detached(sink: &EventSink) -> Self {
        Self {
            cancelled: sink.cancelled.clone(),
            task: None,
        }
    }

    /// Never blocks and can be called any number of times.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            tracing::trace!("Subscription cancelled");
        }

        if let Some(task) = &self.task {
            task.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;

    #[tokio::test]
    async fn events_carry_the_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(7, tx);

        assert!(sink.send(EventKind::Tick));
        assert_eq!(
            rx.recv().await,
            Some(TrackerEvent {
                generation: 7,
                kind: EventKind::Tick
            })
        );
    }

    #[tokio::test]
    async fn cancel_is_idempotent_and_silences_the_sink() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(1, tx);
        let handle = SubscriptionHandle::detached(&sink);

        handle.cancel();
        handle.cancel();

        assert!(handle.is_cancelled());
        assert!(!sink.send(EventKind::Tick));
        drop(sink);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn cancel_aborts_the_producer_task() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = SubscriptionHandle::spawn(EventSink::new(1, tx), |sink| async move {
            loop {
                if !sink.send(EventKind::Tick) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });

        assert!(rx.recv().await.is_some());
        handle.cancel();

        // Drain what was sent before the cancel, then the channel closes since the task is gone
        while rx.recv().await.is_some() {}
    }
}
