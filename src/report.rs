//! The final load test report.
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use reqwest::Url;
use tokio::time::Duration;

use crate::{aggregate::percentile, histogram::LatencyHistogram, stats::Counter, status::Status};

/// Everything measured during one run.
pub struct RunReport {
    /// The target that was exercised.
    pub target: Url,
    /// Number of workers that ran concurrently.
    pub concurrency: u32,
    /// When the measured phase of the run started.
    pub started_at: DateTime<Utc>,
    /// Measured wall time of the run, excluding setup and warm-up.
    pub elapsed: Duration,
    /// Request, failure and byte totals.
    pub counter: Counter,
    /// Latencies of successful samples in completion order.
    pub latencies: Vec<Duration>,
    /// Distribution of successful latencies.
    pub hist: LatencyHistogram,
    /// Responses received, by status.
    pub status_dist: HashMap<Status, u64>,
    /// Failures that produced no response, by message.
    pub error_dist: HashMap<String, u64>,
    /// Percentiles to display, as fractions.
    pub percentiles: Vec<f64>,
}

impl RunReport {
    /// Replaces the percentiles to display.
    pub fn with_percentiles(mut self, percentiles: Vec<f64>) -> Self {
        self.percentiles = percentiles;
        self
    }

    /// Total number of request attempts.
    pub fn total_requests(&self) -> u64 {
        self.counter.requests
    }

    /// Number of successful attempts.
    pub fn success_count(&self) -> u64 {
        self.counter.successes()
    }

    /// Number of failed attempts.
    pub fn failure_count(&self) -> u64 {
        self.counter.failures
    }

    /// Failed attempts over all attempts, zero when nothing ran.
    pub fn error_rate(&self) -> f64 {
        if self.counter.requests == 0 {
            return 0.0;
        }
        self.counter.failures as f64 / self.counter.requests as f64
    }

    /// Attempts per second of measured wall time, zero when no time elapsed.
    pub fn rps(&self) -> f64 {
        crate::util::rate(self.counter.requests, self.elapsed)
    }

    /// Body bytes per second of measured wall time.
    pub fn bytes_rate(&self) -> f64 {
        crate::util::rate(self.counter.bytes, self.elapsed)
    }

    /// Mean latency of successful attempts, zero when there were none.
    pub fn average_latency(&self) -> Duration {
        match self.counter.successes() {
            0 => Duration::ZERO,
            n => Duration::from_nanos((self.counter.latency.as_nanos() / n as u128) as u64),
        }
    }

    /// Latency at fraction `p` of the successful attempts.
    ///
    /// Sorts a copy of the latencies; the report itself is left untouched.
    pub fn percentile(&self, p: f64) -> Duration {
        let mut sorted = self.latencies.clone();
        sorted.sort_unstable();
        percentile(&sorted, p)
    }

    /// Latencies at each configured percentile, computed over a single sort.
    pub fn percentile_values(&self) -> Vec<(f64, Duration)> {
        let mut sorted = self.latencies.clone();
        sorted.sort_unstable();
        self.percentiles.iter().map(|&p| (p, percentile(&sorted, p))).collect()
    }
}
