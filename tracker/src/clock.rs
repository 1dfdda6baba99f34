use std::{sync::{Arc, Mutex}, time::Duration};

use tokio::time::MissedTickBehavior;

use crate::subscription::{EventKind, EventSink, SubscriptionHandle};

/// Something that emits one tick per elapsed second of hiking.
pub trait Clock: Send + Sync {
    fn subscribe(&self, sink: EventSink) -> SubscriptionHandle;
}

/// Ticks on a tokio interval.
pub struct IntervalClock {
    period: Duration,
}

impl IntervalClock {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }
}

impl Default for IntervalClock {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl Clock for IntervalClock {
    fn subscribe(&self, sink: EventSink) -> SubscriptionHandle {
        let period = self.period;

        SubscriptionHandle::spawn(sink, move |sink| async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            interval.tick().await;

            loop {
                interval.tick().await;
                if !sink.send(EventKind::Tick) {
                    break;
                }
            }
        })
    }
}

/// Ticks only when told to.
#[derive(Clone, Default)]
pub struct ManualClock {
    sinks: Arc<Mutex<Vec<EventSink>>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends `seconds` ticks to every live subscriber.
    pub fn advance(&self, seconds: u64) {
        let mut sinks = self.sinks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        sinks.retain(|sink| (0..seconds).all(|_| sink.send(EventKind::Tick)) && !sink.is_cancelled());
    }

    pub fn subscribers(&self) -> usize {
        let mut sinks = self.sinks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        sinks.retain(|sink| !sink.is_cancelled());
        sinks.len()
    }
}

impl Clock for ManualClock {
    fn subscribe(&self, sink: EventSink) -> SubscriptionHandle {
        let handle = SubscriptionHandle::detached(&sink);
        self.sinks.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).push(sink);
        handle
    }
}
