use std::time::Duration;

use crate::sample::Sample;

/// Cumulative totals over a set of samples.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Counter {
    /// Request attempts.
    pub requests: u64,
    /// Failed attempts.
    pub failures: u64,
    /// Body bytes received.
    pub bytes:    u64,
    /// Sum of the latencies of successful samples.
    pub latency:  Duration,
}

impl Counter {
    /// Successful attempts.
    pub fn successes(&self) -> u64 {
        self.requests - self.failures
    }
}

impl std::ops::AddAssign<&Sample> for Counter {
    fn add_assign(&mut self, sample: &Sample) {
        self.requests += 1;
        self.bytes += sample.bytes;
        if sample.success {
            self.latency += sample.latency;
        } else {
            self.failures += 1;
        }
    }
}

impl std::ops::Sub<&Counter> for &Counter {
    type Output = Counter;

    fn sub(self, rhs: &Counter) -> Counter {
        Counter {
            requests: self.requests - rhs.requests,
            failures: self.failures - rhs.failures,
            bytes:    self.bytes - rhs.bytes,
            latency:  self.latency - rhs.latency,
        }
    }
}
