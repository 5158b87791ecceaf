//! Owned background loops.
//!
//! Every repeating activity in the client (peer polling, status polling, the
//! QR frame loop) runs as a spawned tokio task held in a [`TaskGuard`].  The
//! guard aborts the task when it is dropped, so replacing or clearing the
//! owning field is enough to stop the loop.  No loop can outlive the session
//! that started it.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// A spawned task that is aborted on drop.
#[derive(Debug)]
pub struct TaskGuard {
    handle: JoinHandle<()>,
}

impl TaskGuard {
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Spawns a loop that calls `tick` every `period` until it returns
/// [`ControlFlow::Break`].
///
/// The first call happens one full period after spawning.  Ticks never
/// overlap: a slow `tick` delays the next one instead of piling up.
pub fn spawn_interval<F, Fut>(period: Duration, mut tick: F) -> TaskGuard
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ControlFlow<()>> + Send + 'static,
{
    let handle = tokio::spawn(async move {
        let period = period.max(Duration::from_millis(1));
        let mut interval = time::interval_at(time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if tick().await.is_break() {
                break;
            }
        }
    });
    TaskGuard::new(handle)
}

/// Exponential backoff for retried calls: `base`, `2 * base`, `4 * base`, ...
/// capped at `max`.
#[derive(Debug, Clone)]
pub struct RetryBackoff {
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl RetryBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            attempt: 0,
        }
    }

    /// Delay before the next retry.  Each call doubles the following delay.
    pub fn next_delay(&mut self) -> Duration {
        let factor = 1u32.checked_shl(self.attempt).unwrap_or(u32::MAX);
        self.attempt = self.attempt.saturating_add(1);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Number of retries since the last success.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_backoff_doubles_until_cap() {
        // Arrange
        let mut backoff = RetryBackoff::new(Duration::from_millis(100), Duration::from_secs(2));

        // Act
        let delays: Vec<Duration> = (0..7).map(|_| backoff.next_delay()).collect();

        // Assert
        let millis: Vec<u128> = delays.iter().map(|d| d.as_millis()).collect();
        assert_eq!(millis, vec![100, 200, 400, 800, 1600, 2000, 2000]);
    }

    #[test]
    fn test_backoff_reset_starts_over() {
        let mut backoff = RetryBackoff::new(Duration::from_millis(100), Duration::from_secs(2));
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_backoff_survives_many_attempts() {
        let mut backoff = RetryBackoff::new(Duration::from_millis(100), Duration::from_secs(2));
        for _ in 0..100 {
            backoff.next_delay();
        }
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_first_tick_waits_one_period() {
        // Arrange
        let ticks = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&ticks);

        // Act
        let _guard = spawn_interval(Duration::from_millis(500), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                ControlFlow::Continue(())
            }
        });
        time::sleep(Duration::from_millis(400)).await;
        let before_first_period = ticks.load(Ordering::SeqCst);
        time::sleep(Duration::from_millis(700)).await;

        // Assert
        assert_eq!(before_first_period, 0);
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_guard_stops_the_loop() {
        let ticks = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&ticks);
        let guard = spawn_interval(Duration::from_millis(100), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                ControlFlow::Continue(())
            }
        });
        time::sleep(Duration::from_millis(350)).await;
        drop(guard);
        let at_drop = ticks.load(Ordering::SeqCst);

        time::sleep(Duration::from_secs(5)).await;

        assert_eq!(at_drop, 3);
        assert_eq!(ticks.load(Ordering::SeqCst), at_drop);
    }

    #[tokio::test(start_paused = true)]
    async fn test_break_ends_the_loop() {
        let ticks = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&ticks);
        let guard = spawn_interval(Duration::from_millis(100), move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 1 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            }
        });
        time::sleep(Duration::from_secs(1)).await;

        assert_eq!(ticks.load(Ordering::SeqCst), 2);
        assert!(guard.is_finished());
    }
}
