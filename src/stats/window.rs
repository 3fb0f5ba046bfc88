//! Sliding window statistics for progress reporting.
//!
//! The window stores cumulative [`Counter`] snapshots taken at a fixed frame
//! rate. The activity over the last N seconds is the difference between the
//! newest snapshot and the one taken N seconds earlier.

use std::{collections::VecDeque, num::NonZeroUsize};

use nonzero_ext::nonzero;
use tokio::time::Duration;

use super::Counter;

/// A bounded queue of counter snapshots, newest first.
struct RotateWindow {
    buckets: VecDeque<Counter>,
    size: NonZeroUsize,
}

impl RotateWindow {
    fn new(size: NonZeroUsize) -> Self {
        let mut win = Self { buckets: VecDeque::with_capacity(size.get()), size };
        win.rotate(Counter::default());
        win
    }

    fn rotate(&mut self, bucket: Counter) {
        if self.buckets.len() == self.size.get() {
            self.buckets.pop_back();
        }
        self.buckets.push_front(bucket);
    }

    fn len(&self) -> usize {
        self.buckets.len()
    }

    fn front(&self) -> &Counter {
        // SAFETY: `buckets` is never empty
        self.buckets.front().unwrap()
    }

    fn back(&self) -> &Counter {
        // SAFETY: `buckets` is never empty
        self.buckets.back().unwrap()
    }

    fn get(&self, index: usize) -> Option<&Counter> {
        self.buckets.get(index)
    }
}

/// A sliding window for calculating rate statistics over recent time spans.
///
/// # Example
///
/// ```ignore
/// let mut win = RotateDiffWindow::new(nonzero!(10usize)); // 10 fps
/// win.rotate(counter);
/// let (delta, duration) = win.counter_for_secs(1);  // last 1 second
/// ```
pub struct RotateDiffWindow {
    interval: Duration,
    fps: usize,
    window: RotateWindow,
}

impl RotateDiffWindow {
    /// Creates a new diff window rotated `fps` times per second.
    pub fn new(fps: NonZeroUsize) -> Self {
        let interval = Duration::from_secs_f64(1.0 / fps.get() as f64);
        // keep one minute of history
        let size = fps.saturating_mul(nonzero!(60usize)).saturating_add(1);
        Self { interval, fps: fps.get(), window: RotateWindow::new(size) }
    }

    /// Returns the time between two rotations.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Pushes a new cumulative snapshot.
    pub fn rotate(&mut self, counter: Counter) {
        self.window.rotate(counter);
    }

    /// Returns the counter delta and the duration covered for the last `secs` seconds.
    ///
    /// If the window does not hold enough snapshots yet, the whole window is used
    /// and the returned duration reflects the span actually covered.
    pub fn counter_for_secs(&self, secs: usize) -> (Counter, Duration) {
        let frames_back = self.fps * secs;
        let clamped = frames_back.min(self.window.len().saturating_sub(1));
        let duration = clamped as u32 * self.interval;
        let back = self.window.get(clamped).unwrap_or_else(|| self.window.back());
        (self.window.front() - back, duration)
    }
}
