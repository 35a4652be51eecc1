//! Clock abstraction.
//!
//! The supervisor never reads time itself. Drivers do, through an
//! [`Environment`]: the client uses tokio's clock, the simulation harness a
//! virtual one that only moves when a test advances it, so backoff schedules
//! can be asserted exactly.

use std::{ops::Sub, time::Duration};

/// Time source for drivers.
///
/// `now()` must never go backwards.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Point in time; the difference of two is the elapsed duration.
    type Instant: Copy + Ord + Send + Sync + Sub<Output = Duration>;

    /// Current instant.
    fn now(&self) -> Self::Instant;

    /// Resolve after `duration`. Used for retry timers and room polling.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}
