//! Time points and the injected clock capability.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Instant on the race timeline.
pub type TimePoint = DateTime<Utc>;

/// `at` shifted by `delta`, pinned to the first or last representable instant
/// when the sum falls outside chrono's range.
///
/// Offsets read from a log are arbitrary, so timeline arithmetic on them goes
/// through here rather than `+`/`-`.
pub fn saturating_offset(at: TimePoint, delta: Duration) -> TimePoint {
    at.checked_add_signed(delta).unwrap_or(if delta < Duration::zero() {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> TimePoint;
}

/// Reads the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> TimePoint {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<TimePoint>,
}

impl ManualClock {
    pub fn new(now: TimePoint) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: TimePoint) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> TimePoint {
        *self.now.lock()
    }
}
