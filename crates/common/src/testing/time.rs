//! Time abstraction for testability
//!
//! [`MockClock`] implements [`Clock`] with a wall clock that only moves when
//! a test advances it, so expiry checks are deterministic.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use crate::auth::Clock;

/// Mock clock for testing
///
/// # Examples
///
/// ```ignore
/// use std::time::Duration;
///
/// use eventtracker_common::auth::Clock;
/// use eventtracker_common::testing::MockClock;
///
/// let clock = MockClock::new(0);
/// clock.advance(Duration::from_millis(1500));
/// assert_eq!(clock.now_millis(), 1500);
/// ```
#[derive(Debug, Default)]
pub struct MockClock {
    millis: AtomicI64,
}

impl MockClock {
    /// Create a mock clock reading `epoch_millis`.
    pub fn new(epoch_millis: i64) -> Self {
        Self { millis: AtomicI64::new(epoch_millis) }
    }

    /// Advance the clock by `duration`.
    pub fn advance(&self, duration: Duration) {
        let delta = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }

    /// Jump to an absolute time.
    pub fn set(&self, epoch_millis: i64) {
        self.millis.store(epoch_millis, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}
