//! Pending state events, released once each when their time comes.

use parking_lot::Mutex;
use racelog_core::TimePoint;
use tracing::trace;

use crate::state_event::{StateEvent, StateEventName};

/// Time-ordered queue of pending state events.
///
/// Events with equal times keep their scheduling order.
#[derive(Debug, Default)]
pub struct StateEventScheduler {
    pending: Mutex<Vec<StateEvent>>,
}

impl StateEventScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&self, events: impl IntoIterator<Item = StateEvent>) {
        let mut pending = self.pending.lock();
        for event in events {
            trace!(%event, "scheduling state event");
            let position = pending.partition_point(|queued| queued.at <= event.at);
            pending.insert(position, event);
        }
    }

    /// Drop every pending event with this name. Returns how many were dropped.
    pub fn unschedule(&self, name: StateEventName) -> usize {
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.retain(|event| event.name != name);
        before - pending.len()
    }

    pub fn unschedule_all(&self) {
        self.pending.lock().clear();
    }

    pub fn pending(&self) -> Vec<StateEvent> {
        self.pending.lock().clone()
    }

    pub fn next_due_at(&self) -> Option<TimePoint> {
        self.pending.lock().first().map(|event| event.at)
    }

    /// Remove and return, oldest first, every event due at or before `now`.
    pub fn take_due(&self, now: TimePoint) -> Vec<StateEvent> {
        let mut pending = self.pending.lock();
        let due = pending.partition_point(|event| event.at <= now);
        pending.drain(..due).collect()
    }
}
