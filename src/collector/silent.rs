//! Silent (headless) report collector.
//!
//! [`SilentCollector`] aggregates samples without any terminal output. It is
//! the collector of choice for scripts and CI, and when stderr is not a
//! terminal.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

use super::RunMeta;
use crate::{aggregate::Aggregator, report::RunReport, sample::Sample};

/// A report collector that aggregates samples without terminal output.
///
/// The collector responds to `Ctrl+C` by cancelling the run; in-flight
/// requests still drain into the report.
pub struct SilentCollector {
    meta: RunMeta,
    sample_rx: UnboundedReceiver<Sample>,
    cancel: CancellationToken,
}

impl SilentCollector {
    /// Create a new silent report collector.
    pub fn new(meta: RunMeta, sample_rx: UnboundedReceiver<Sample>, cancel: CancellationToken) -> Self {
        Self { meta, sample_rx, cancel }
    }
}

#[async_trait]
impl super::ReportCollector for SilentCollector {
    async fn run(&mut self) -> Result<RunReport> {
        let mut agg = Aggregator::new();

        loop {
            tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("interrupted, waiting for in-flight requests");
                    self.cancel.cancel();
                }
                s = self.sample_rx.recv() => match s {
                    Some(sample) => agg.record(&sample)?,
                    None => break,
                },
            }
        }

        let elapsed = self.meta.clock.elapsed();
        let meta = self.meta.clone();
        Ok(agg.finish(meta.target, meta.concurrency, meta.started_at, elapsed))
    }
}
