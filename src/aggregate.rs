//! Reduction of collected samples into a run report.
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use reqwest::Url;
use tokio::time::Duration;

use crate::{
    error::CollectorError,
    histogram::LatencyHistogram,
    report::RunReport,
    sample::{Outcome, Sample},
    stats::Counter,
    status::Status,
};

/// Percentiles reported when none are configured, as fractions.
pub const DEFAULT_PERCENTILES: &[f64] = &[0.5, 0.9, 0.95, 0.99];

/// Linear-interpolation percentile over **sorted** latencies.
///
/// `p` is a fraction in `[0, 1]`; values outside are clamped. Returns zero for
/// an empty slice.
pub fn percentile(sorted: &[Duration], p: f64) -> Duration {
    let n = sorted.len();
    if n == 0 {
        return Duration::ZERO;
    }

    let k = (n - 1) as f64 * p.clamp(0.0, 1.0);
    let f = k.floor() as usize;
    let c = (f + 1).min(n - 1);
    if f == c {
        return sorted[f];
    }

    let lo = sorted[f].as_nanos() as f64;
    let hi = sorted[c].as_nanos() as f64;
    Duration::from_nanos((lo + (hi - lo) * (k - f as f64)).round() as u64)
}

/// Accumulates samples as they arrive from the workers.
///
/// The aggregator is owned by a single collector task, so it needs no
/// synchronization.
#[derive(Default)]
pub struct Aggregator {
    counter: Counter,
    latencies: Vec<Duration>,
    hist: LatencyHistogram,
    status_dist: HashMap<Status, u64>,
    error_dist: HashMap<String, u64>,
}

impl Aggregator {
    /// Creates an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one sample.
    pub fn record(&mut self, sample: &Sample) -> Result<(), CollectorError> {
        self.counter += sample;
        match &sample.outcome {
            Outcome::Response(status) => *self.status_dist.entry(*status).or_default() += 1,
            outcome => *self.error_dist.entry(outcome.to_string()).or_default() += 1,
        }
        if sample.success {
            self.latencies.push(sample.latency);
            self.hist.record(sample.latency)?;
        }
        Ok(())
    }

    /// Totals recorded so far.
    pub fn counter(&self) -> &Counter {
        &self.counter
    }

    /// Produces the final report for a run that measured `elapsed` of wall time.
    pub fn finish(self, target: Url, concurrency: u32, started_at: DateTime<Utc>, elapsed: Duration) -> RunReport {
        RunReport {
            target,
            concurrency,
            started_at,
            elapsed,
            counter: self.counter,
            latencies: self.latencies,
            hist: self.hist,
            status_dist: self.status_dist,
            error_dist: self.error_dist,
            percentiles: DEFAULT_PERCENTILES.to_vec(),
        }
    }
}
