//! Error types for configuration and result collection.
use std::time::Duration;

use thiserror::Error;

/// Errors detected while validating a run configuration.
///
/// These are the only fatal errors of a load test. They are reported before
/// any worker starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The target URL uses a scheme other than `http` or `https`.
    #[error("unsupported url scheme '{scheme}': expected http or https")]
    UnsupportedScheme {
        /// The rejected scheme.
        scheme: String,
    },

    /// The target URL has no host.
    #[error("url '{url}' has no host")]
    MissingHost {
        /// The rejected url.
        url: String,
    },

    /// Concurrency must be at least one worker.
    #[error("concurrency must be greater than zero")]
    ZeroConcurrency,

    /// The run duration must be positive.
    #[error("duration must be greater than zero")]
    ZeroDuration,

    /// The per-request timeout must be positive.
    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    /// A requested percentile is outside `[0, 100]`.
    #[error("invalid percentile {0}: must be within [0, 100]")]
    InvalidPercentile(f64),

    /// The HTTP client could not be built.
    #[error("failed to build http client")]
    Client(#[source] reqwest::Error),
}

/// Errors raised while collecting samples into a report.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// The latency does not fit into the histogram's value range.
    #[error("latency {latency:?} is too large to record")]
    LatencyTooLarge {
        /// The offending latency.
        latency: Duration,
    },

    /// The histogram rejected the value.
    #[error("failed to record latency in histogram")]
    HistogramRecord(#[source] hdrhistogram::RecordError),
}
