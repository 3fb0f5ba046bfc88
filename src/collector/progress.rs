//! Report collector printing a progress line while the run is going.
use std::{io::Write, num::NonZeroUsize};

use anyhow::Result;
use async_trait::async_trait;
use tokio::{sync::mpsc::UnboundedReceiver, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::RunMeta;
use crate::{aggregate::Aggregator, report::RunReport, sample::Sample, stats::RotateDiffWindow, util::rate};

/// Counter snapshots taken per second.
const FPS: NonZeroUsize = NonZeroUsize::new(4).unwrap();

/// A report collector that writes one progress line per second.
///
/// Each line shows the totals so far and the request rate over the last
/// second. Like [`SilentCollector`](super::SilentCollector) it cancels the
/// run on `Ctrl+C`.
pub struct ProgressCollector {
    meta: RunMeta,
    sample_rx: UnboundedReceiver<Sample>,
    cancel: CancellationToken,
    out: Box<dyn Write + Send>,
}

impl ProgressCollector {
    /// Create a progress collector writing to stderr.
    pub fn new(meta: RunMeta, sample_rx: UnboundedReceiver<Sample>, cancel: CancellationToken) -> Self {
        Self::with_writer(meta, sample_rx, cancel, Box::new(std::io::stderr()))
    }

    /// Create a progress collector writing to `out`.
    pub fn with_writer(
        meta: RunMeta,
        sample_rx: UnboundedReceiver<Sample>,
        cancel: CancellationToken,
        out: Box<dyn Write + Send>,
    ) -> Self {
        Self { meta, sample_rx, cancel, out }
    }

    fn print_progress(&mut self, agg: &Aggregator, window: &RotateDiffWindow) -> Result<()> {
        let counter = agg.counter();
        let (recent, span) = window.counter_for_secs(1);
        writeln!(
            self.out,
            "[{:>8.2}s] requests: {}  failures: {}  rps: {:.2}",
            self.meta.clock.elapsed().as_secs_f64(),
            counter.requests,
            counter.failures,
            rate(recent.requests, span),
        )?;
        Ok(())
    }
}

#[async_trait]
impl super::ReportCollector for ProgressCollector {
    async fn run(&mut self) -> Result<RunReport> {
        let mut agg = Aggregator::new();
        let mut window = RotateDiffWindow::new(FPS);

        let mut ticker = tokio::time::interval(window.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // the first tick completes immediately
        ticker.tick().await;
        let mut frames = 0usize;

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
                _ = ticker.tick() => {
                    // nothing to report before the workers are ready
                    if self.meta.clock.is_paused() {
                        continue;
                    }
                    window.rotate(*agg.counter());
                    frames += 1;
                    if frames % FPS.get() == 0 {
                        self.print_progress(&agg, &window)?;
                    }
                }
            }
        }

        let elapsed = self.meta.clock.elapsed();
        let meta = self.meta.clone();
        Ok(agg.finish(meta.target, meta.concurrency, meta.started_at, elapsed))
    }
}
