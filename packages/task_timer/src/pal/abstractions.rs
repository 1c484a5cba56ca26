//! Platform abstraction trait definitions.

use std::fmt::Debug;
use std::time::Instant;

/// Provides the current time of a monotonic clock.
///
/// Consecutive calls on the same platform never go backwards.
pub(crate) trait Platform: Debug + Send + Sync + 'static {
    /// Gets the current monotonic time.
    fn now(&self) -> Instant;
}
