//! Fake platform implementation for testing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::pal::abstractions::Platform;

/// Fake implementation of the platform abstraction for testing.
///
/// The clock starts at an arbitrary origin and only moves when a test advances it.
/// Multiple clones of the same `FakePlatform` share the same underlying clock, so a test
/// can keep one clone and move time forward while a recorder holds another.
#[derive(Clone, Debug)]
pub(crate) struct FakePlatform {
    origin: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl FakePlatform {
    /// Creates a new fake platform whose clock stands still at its origin.
    pub(crate) fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Moves the clock forward by `delta`.
    ///
    /// This affects all clones of this platform.
    pub(crate) fn advance(&self, delta: Duration) {
        let mut elapsed = self.elapsed.lock();
        *elapsed = elapsed
            .checked_add(delta)
            .expect("fake clock overflowed Duration - this indicates a broken test");
    }
}

impl Platform for FakePlatform {
    fn now(&self) -> Instant {
        self.origin
            .checked_add(*self.elapsed.lock())
            .expect("fake clock overflowed Instant - this indicates a broken test")
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn stands_still_until_advanced() {
        let platform = FakePlatform::new();

        assert_eq!(platform.now(), platform.now());
    }

    #[test]
    fn advances_accumulate() {
        let platform = FakePlatform::new();
        let start = platform.now();

        platform.advance(Duration::from_millis(100));
        platform.advance(Duration::from_millis(50));

        assert_eq!(
            platform.now().duration_since(start),
            Duration::from_millis(150)
        );
    }

    #[test]
    fn shared_state_between_clones() {
        let platform1 = FakePlatform::new();
        let platform2 = platform1.clone();
        let start = platform2.now();

        platform1.advance(Duration::from_millis(100));

        assert_eq!(
            platform2.now().duration_since(start),
            Duration::from_millis(100)
        );
    }
}
