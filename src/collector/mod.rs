//! Collectors consume samples from the worker pool and produce the run report.
//!
//! A collector is the single owner of the aggregate state: workers only ever
//! send samples over a channel. Once the channel closes, which happens when the
//! last worker exits, the collector reads the run clock and finishes the report.
mod progress;
mod silent;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;

pub use progress::ProgressCollector;
pub use silent::SilentCollector;

use crate::{clock::Clock, report::RunReport};

/// A trait for collecting samples into a report.
#[async_trait]
pub trait ReportCollector: Send {
    /// Run the collector until the pool has stopped and return the report.
    async fn run(&mut self) -> anyhow::Result<RunReport>;
}

/// Run facts every collector stamps on the report it produces.
#[derive(Clone, Debug)]
pub struct RunMeta {
    /// The target of the run.
    pub target: Url,
    /// Number of concurrent workers.
    pub concurrency: u32,
    /// Clock measuring the main phase of the run.
    pub clock: Clock,
    /// When the run was started.
    pub started_at: DateTime<Utc>,
}

impl RunMeta {
    /// Creates run metadata stamped with the current time.
    pub fn new(target: Url, concurrency: u32, clock: Clock) -> Self {
        Self { target, concurrency, clock, started_at: Utc::now() }
    }
}
