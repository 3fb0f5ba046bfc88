//! HDR histogram of successful request latencies, used for distribution output.
use std::time::Duration;

use hdrhistogram::Histogram;

use crate::error::CollectorError;

/// Latency distribution with three significant digits of precision.
///
/// Exact percentiles are computed from the raw latencies by
/// [`percentile`](crate::aggregate::percentile); the histogram only backs
/// the spread statistics and the bucketed view in reports.
#[derive(Clone)]
pub struct LatencyHistogram {
    hist: Histogram<u64>,
}

impl LatencyHistogram {
    /// Creates a new latency histogram.
    pub fn new() -> LatencyHistogram {
        Self { hist: Histogram::<u64>::new(3).expect("3 significant digits is a valid precision") }
    }

    /// Records a latency value.
    pub fn record(&mut self, d: Duration) -> Result<(), CollectorError> {
        let nanos = u64::try_from(d.as_nanos()).map_err(|_| CollectorError::LatencyTooLarge { latency: d })?;
        self.hist.record(nanos).map_err(CollectorError::HistogramRecord)
    }

    /// Returns true if this histogram has no recorded values.
    pub fn is_empty(&self) -> bool {
        self.hist.is_empty()
    }

    /// Highest recorded latency, zero when empty.
    pub fn max(&self) -> Duration {
        self.nanos_or_zero(|h| h.max())
    }

    /// Lowest recorded latency, zero when empty.
    pub fn min(&self) -> Duration {
        self.nanos_or_zero(|h| h.min())
    }

    /// Standard deviation of the recorded latencies, zero when empty.
    pub fn stdev(&self) -> Duration {
        self.nanos_or_zero(|h| h.stdev() as u64)
    }

    fn nanos_or_zero(&self, f: impl FnOnce(&Histogram<u64>) -> u64) -> Duration {
        if self.is_empty() { Duration::ZERO } else { Duration::from_nanos(f(&self.hist)) }
    }

    /// Iterate through histogram values by quantile levels.
    ///
    /// See [`hdrhistogram::Histogram::iter_quantiles`] for more details.
    pub fn quantiles(&self) -> impl Iterator<Item = (Duration, u64)> + '_ {
        self.hist
            .iter_quantiles(1)
            .map(|t| (Duration::from_nanos(t.value_iterated_to()), t.count_since_last_iteration()))
            .filter(|(_, n)| *n > 0)
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_bounds() {
        let mut hist = LatencyHistogram::new();
        assert!(hist.is_empty());

        for ms in [10, 20, 30, 40] {
            hist.record(Duration::from_millis(ms)).unwrap();
        }

        assert!(!hist.is_empty());
        let min = hist.min().as_secs_f64();
        let max = hist.max().as_secs_f64();
        assert!((min - 0.010).abs() < 0.0001, "min = {min}");
        assert!((max - 0.040).abs() < 0.0001, "max = {max}");
        assert_eq!(hist.quantiles().map(|(_, n)| n).sum::<u64>(), 4);
    }

    #[test]
    fn test_empty_stats_are_zero() {
        let hist = LatencyHistogram::new();
        assert_eq!(hist.min(), Duration::ZERO);
        assert_eq!(hist.max(), Duration::ZERO);
        assert_eq!(hist.stdev(), Duration::ZERO);
        assert_eq!(hist.quantiles().count(), 0);
    }

    #[test]
    fn test_record_rejects_oversized_latency() {
        let mut hist = LatencyHistogram::new();
        let err = hist.record(Duration::MAX).unwrap_err();
        assert!(matches!(err, CollectorError::LatencyTooLarge { .. }));
    }
}
