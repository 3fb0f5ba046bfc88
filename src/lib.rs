//! An HTTP load tester that measures throughput, latency and error rate.
//!
//! A run drives a fixed number of concurrent workers against one endpoint for
//! a fixed wall-clock duration. Every request attempt becomes a [`Sample`];
//! samples flow to a single collector that aggregates them into a
//! [`RunReport`], which a reporter then prints.
//!
//! ## Features
//!
//! - **Exact percentiles**: linear interpolation over the sorted successful
//!   latencies, configurable per run.
//! - **Clean stop**: workers stop on a cancellation token checked before each
//!   request, and in-flight requests always drain into the report.
//! - **Warm-up and pacing**: discarded warm-up requests, an optional request
//!   cap and an optional global rate limit.
//! - **Bundled mock**: a tiny local responder to load when no target is at hand.
//!
//! ## Example
//!
//! Driving the pool with a custom sampler:
//!
//! ```no_run
//! use async_trait::async_trait;
//! use httpload::{
//!     IterInfo, RunConfig, Sample, StatelessSampler, Status,
//!     cli::{Collector, execute},
//! };
//! use tokio::time::{Duration, Instant};
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Clone)]
//! struct Noop;
//!
//! #[async_trait]
//! impl StatelessSampler for Noop {
//!     async fn sample(&mut self, _: &IterInfo) -> Sample {
//!         let t = Instant::now();
//!         // do the work here
//!         Sample::response(t.elapsed(), Status::from_code(200), true, 0)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = RunConfig::new(
//!         "http://localhost:8080/".parse()?,
//!         Duration::from_secs(5),
//!         4,
//!         Duration::from_secs(2),
//!     );
//!     config.validate()?;
//!     let report = execute(&config, Noop, Collector::Silent, CancellationToken::new()).await?;
//!     println!("p99: {:?}", report.percentile(0.99));
//!     Ok(())
//! }
//! ```
#![deny(missing_docs)]

mod duration;
mod util;

pub mod aggregate;
pub mod cli;
pub mod clock;
pub mod collector;
pub mod config;
pub mod error;
pub mod histogram;
pub mod mock;
pub mod report;
pub mod reporter;
pub mod runner;
pub mod sample;
pub mod sampler;
pub mod stats;
pub mod status;

pub use crate::{
    aggregate::{Aggregator, percentile},
    config::RunConfig,
    error::{CollectorError, ConfigError},
    report::RunReport,
    runner::IterInfo,
    sample::{Outcome, Sample},
    sampler::{HttpSampler, Sampler, StatelessSampler},
    status::{Status, SuccessPolicy},
};
