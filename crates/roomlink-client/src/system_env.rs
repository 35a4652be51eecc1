//! Production environment backed by the tokio clock.
//!
//! Uses `tokio::time::Instant` rather than `std::time::Instant` so a paused
//! test runtime (`start_paused = true`) sees the same virtual time for both
//! `now()` and `sleep()`.

use std::time::Duration;

use roomlink_core::env::Environment;

/// Real time, through tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// The tokio clock.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

#[cfg(test)]
mod tests {
    use roomlink_core::Backoff;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_advances_now_by_exactly_the_delay() {
        let env = SystemEnv::new();

        let start = env.now();
        env.sleep(Duration::from_millis(1500)).await;

        assert_eq!(env.now() - start, Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn default_backoff_sleeps_saturate_at_last_delay() {
        let env = SystemEnv::new();
        let mut backoff = Backoff::default();
        let start = env.now();

        for _ in 0..5 {
            env.sleep(backoff.next_delay()).await;
        }

        // 1 + 2 + 3 + 5, then the last entry again
        assert_eq!(env.now() - start, Duration::from_secs(16));
        assert_eq!(backoff.peek(), Duration::from_secs(5));
    }
}
