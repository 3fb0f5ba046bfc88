//! Validated configuration of a single load test run.
use std::num::NonZeroU32;

use reqwest::Url;
use tokio::time::Duration;

use crate::{aggregate::DEFAULT_PERCENTILES, error::ConfigError, status::SuccessPolicy};

/// Configuration of one run. Immutable once the run starts.
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Endpoint every request is sent to.
    pub target: Url,
    /// How long to issue new requests for.
    pub duration: Duration,
    /// Number of concurrent workers.
    pub concurrency: u32,
    /// Upper bound on a single request attempt.
    pub timeout: Duration,
    /// Which response statuses count as success.
    pub policy: SuccessPolicy,
    /// Number of warm-up requests issued before measuring.
    pub warmups: u64,
    /// Optional cap on the number of measured requests.
    pub iterations: Option<u64>,
    /// Optional global rate limit, in requests per second.
    pub rate: Option<NonZeroU32>,
    /// Percentiles to report, as fractions in `[0, 1]`.
    pub percentiles: Vec<f64>,
}

impl RunConfig {
    /// Creates a configuration with the default policy and percentiles.
    pub fn new(target: Url, duration: Duration, concurrency: u32, timeout: Duration) -> Self {
        Self {
            target,
            duration,
            concurrency,
            timeout,
            policy: SuccessPolicy::default(),
            warmups: 0,
            iterations: None,
            rate: None,
            percentiles: DEFAULT_PERCENTILES.to_vec(),
        }
    }

    /// Checks every field, returning the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.target.scheme() {
            "http" | "https" => {}
            scheme => return Err(ConfigError::UnsupportedScheme { scheme: scheme.to_string() }),
        }
        if self.target.host_str().is_none_or(str::is_empty) {
            return Err(ConfigError::MissingHost { url: self.target.to_string() });
        }
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.duration.is_zero() {
            return Err(ConfigError::ZeroDuration);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if let Some(&p) = self.percentiles.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            return Err(ConfigError::InvalidPercentile(p * 100.0));
        }
        Ok(())
    }
}
