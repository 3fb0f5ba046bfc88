//! A logical clock measuring the wall time of the measured phase.
//!
//! The runner creates the clock held at zero, and the last worker to finish
//! setup and warm-up starts it. [`Clock::elapsed`] therefore excludes start-up work, and
//! [`Clock::sleep`] lets the stop controller wait for the run duration in the
//! same logical time.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::{self, Duration, Instant};

/// A logical clock that stays at zero until resumed.
///
/// The clock is thread-safe and can be cloned to share between tasks.
#[derive(Debug, Clone)]
pub struct Clock {
    #[cfg(feature = "rate_limit")]
    start: Instant,
    status: Arc<Mutex<Status>>,
}

#[derive(Debug, Clone, Copy, Default)]
enum Status {
    #[default]
    Paused,
    Running(Instant),
}

impl Clock {
    fn new(status: Status) -> Self {
        cfg_if::cfg_if! {
            if #[cfg(feature = "rate_limit")] {
                Self { start: Instant::now(), status: Arc::new(Mutex::new(status)) }
            } else {
                Self { status: Arc::new(Mutex::new(status)) }
            }
        }
    }

    /// Creates a new clock in paused state.
    /// Call `resume()` to start the clock.
    pub fn new_paused() -> Self {
        Self::new(Status::Paused)
    }

    /// Returns true while the clock is paused.
    pub fn is_paused(&self) -> bool {
        matches!(*self.status.lock(), Status::Paused)
    }

    /// Starts the clock if it is still paused.
    pub fn resume(&self) {
        let mut status = self.status.lock();
        if let Status::Paused = *status {
            *status = Status::Running(Instant::now());
        }
    }

    /// Time since the clock was resumed, zero while paused.
    pub fn elapsed(&self) -> Duration {
        match *self.status.lock() {
            Status::Paused => Duration::ZERO,
            Status::Running(checkpoint) => checkpoint.elapsed(),
        }
    }

    /// Sleeps for `duration` of logical clock time.
    ///
    /// Time spent paused does not count, so the sleep extends until the clock
    /// has been running for `duration`.
    pub async fn sleep(&self, mut duration: Duration) {
        let wake_time = self.elapsed() + duration;
        loop {
            time::sleep(duration).await;
            let elapsed = self.elapsed();
            if elapsed >= wake_time {
                break;
            }
            duration = wake_time - elapsed;
        }
    }
}

// the trait `governor::clock::Clock` is not implemented for `&clock::Clock`
#[cfg(feature = "rate_limit")]
impl governor::clock::Clock for Clock {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        let elapsed = self.elapsed();
        self.start.into_std() + elapsed
    }
}
#[cfg(feature = "rate_limit")]
impl governor::clock::ReasonablyRealtime for Clock {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_paused_clock_does_not_advance() {
        let clock = Clock::new_paused();
        time::sleep(Duration::from_millis(100)).await;
        assert!(clock.is_paused());
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_counts_from_resume() {
        let clock = Clock::new_paused();
        time::sleep(Duration::from_millis(500)).await;
        clock.resume();
        time::sleep(Duration::from_millis(30)).await;
        // a second resume does not restart the clock
        clock.resume();
        time::sleep(Duration::from_millis(20)).await;

        assert!(!clock.is_paused());
        assert_eq!(clock.elapsed(), Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_waits_out_pause() {
        let clock = Clock::new_paused();
        let waker = clock.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(200)).await;
            waker.resume();
        });

        let start = Instant::now();
        clock.sleep(Duration::from_millis(100)).await;

        assert!(start.elapsed() >= Duration::from_millis(300));
        assert!(clock.elapsed() >= Duration::from_millis(100));
    }
}
