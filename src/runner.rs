//! The worker pool that drives a [`Sampler`] concurrently.
//!
//! Workers stop on a shared [`CancellationToken`]. The token is checked before
//! each request, never raced against one, so a request already in flight when
//! the run stops still completes and its sample is delivered. A run may
//! therefore overrun its duration by at most one request per worker, each
//! bounded by the per-request timeout.
use anyhow::Result;
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::{
    select,
    sync::{Barrier, mpsc},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;

cfg_if::cfg_if! {
    if #[cfg(feature = "rate_limit")] {
        use std::num::NonZeroU32;
        use governor::{Quota, RateLimiter};
        use nonzero_ext::nonzero;
    }
}

use crate::{clock::Clock, config::RunConfig, sample::Sample, sampler::Sampler};

/// Core options for the worker pool.
#[derive(Clone, Debug)]
pub struct RunOpts {
    /// Clock measuring the main phase. Resumed once every worker is ready.
    pub clock: Clock,

    /// Number of concurrent workers.
    pub concurrency: u32,

    /// Stop issuing new requests after this much clock time.
    pub duration: Option<Duration>,

    /// Stop after this many measured requests.
    pub iterations: Option<u64>,

    /// Number of warm-up requests to issue before measuring.
    pub warmups: u64,

    #[cfg(feature = "rate_limit")]
    /// Global rate limit, in requests per second.
    pub rate: Option<NonZeroU32>,
}

impl RunOpts {
    /// Derives pool options from a validated run configuration.
    pub fn from_config(config: &RunConfig, clock: Clock) -> Self {
        Self {
            clock,
            concurrency: config.concurrency,
            duration: Some(config.duration),
            iterations: config.iterations,
            warmups: config.warmups,
            #[cfg(feature = "rate_limit")]
            rate: config.rate,
        }
    }
}

/// Information about the current request attempt.
#[derive(Debug, Clone)]
pub struct IterInfo {
    /// The id of the current worker.
    pub worker_id: u32,

    /// The sequence number of the attempt within the current worker.
    pub worker_seq: u64,

    /// The sequence number of the attempt across all workers.
    pub runner_seq: u64,
}

impl IterInfo {
    /// Create a new iteration info for the given worker id.
    pub fn new(worker_id: u32) -> Self {
        Self { worker_id, worker_seq: 0, runner_seq: 0 }
    }
}

/// Runs `concurrency` workers until the run is cancelled, times out or hits its
/// iteration cap, sending every measured sample to `sample_tx`.
#[derive(Clone)]
pub(crate) struct Runner<S>
where
    S: Sampler,
{
    sampler: S,
    opts: RunOpts,
    sample_tx: mpsc::UnboundedSender<Sample>,
    cancel: CancellationToken,
    seq: Arc<AtomicU64>,
}

impl<S> Runner<S>
where
    S: Sampler + Send + 'static,
    S::WorkerState: Send + 'static,
{
    pub(crate) fn new(
        sampler: S,
        opts: RunOpts,
        sample_tx: mpsc::UnboundedSender<Sample>,
        cancel: CancellationToken,
    ) -> Self {
        Self { sampler, opts, sample_tx, cancel, seq: Arc::default() }
    }

    /// Run the pool to completion.
    ///
    /// Returns only after every worker has exited. The sample channel is closed
    /// at that point, so no sample can arrive after this returns.
    pub(crate) async fn run(self) -> Result<()> {
        let workers = self.opts.concurrency;
        let iters = self.opts.iterations;
        let warmup_iters = self.opts.warmups;

        // the trait `governor::clock::Clock` is not implemented for `&clock::Clock`
        #[cfg(feature = "rate_limit")]
        let buckets = self.opts.rate.map(|r| {
            let quota = Quota::per_second(r).allow_burst(nonzero!(1u32));
            let clock = self.opts.clock.clone();
            Arc::new(RateLimiter::direct_with_clock(quota, clock))
        });

        let warmup_seq = Arc::new(AtomicU64::new(0));

        // Workers meet here after setup and again after warm-up; the leader of the
        // second rendezvous starts the clock.
        let barrier = Arc::new(Barrier::new(workers as usize));

        #[cfg(feature = "tracing")]
        tracing::debug!(workers, ?iters, warmups = warmup_iters, "starting workers");

        let mut set: JoinSet<Result<()>> = JoinSet::new();
        for worker in 0..workers {
            #[cfg(feature = "rate_limit")]
            let buckets = buckets.clone();
            let mut b = self.clone();
            let warmup_seq = warmup_seq.clone();
            let barrier = barrier.clone();

            set.spawn(async move {
                let cancel = b.cancel.clone();
                let mut info = IterInfo::new(worker);

                // A failed setup stops the run, but the worker still takes part in
                // both rendezvous so its peers are not left waiting.
                let mut state = b.sampler.setup(worker).await.inspect_err(|_| cancel.cancel());
                barrier.wait().await;

                if let Ok(state) = state.as_mut() {
                    loop {
                        info.runner_seq = warmup_seq.fetch_add(1, Ordering::Relaxed);
                        if info.runner_seq >= warmup_iters {
                            break;
                        }

                        // Warm-up is not paced: the limiter runs on the run clock,
                        // which stays paused until every worker is done here.
                        select! {
                            biased;
                            _ = cancel.cancelled() => break,
                            // warm-up samples are discarded
                            _ = b.sampler.sample(state, &info) => (),
                        }
                        info.worker_seq += 1;
                    }
                }

                if barrier.wait().await.is_leader() {
                    b.opts.clock.resume();
                }

                let mut state = state?;
                info.worker_seq = 0;

                loop {
                    if cancel.is_cancelled() {
                        break;
                    }

                    info.runner_seq = b.seq.fetch_add(1, Ordering::Relaxed);
                    if let Some(iterations) = iters
                        && info.runner_seq >= iterations
                    {
                        break;
                    }

                    #[cfg(feature = "rate_limit")]
                    if let Some(buckets) = &buckets {
                        select! {
                            biased;
                            _ = cancel.cancelled() => break,
                            _ = buckets.until_ready() => (),
                        }
                    }

                    let sample = b.sampler.sample(&mut state, &info).await;
                    // safe to ignore the error which means the receiver is dropped
                    let _ = b.sample_tx.send(sample);
                    info.worker_seq += 1;
                }

                #[cfg(feature = "tracing")]
                tracing::debug!(worker, samples = info.worker_seq, "worker stopped");

                Ok(())
            });
        }

        if let Some(t) = self.opts.duration {
            select! {
                biased;
                _ = self.cancel.cancelled() => (),
                _ = self.opts.clock.sleep(t) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(duration = ?t, "run duration reached, draining workers");
                    self.cancel.cancel();
                }
                res = join_all(&mut set) => return res,
            }
        };

        join_all(&mut set).await
    }
}

async fn join_all(set: &mut JoinSet<Result<()>>) -> Result<()> {
    while let Some(res) = set.join_next().await {
        res??;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use tokio::{sync::mpsc::error::TryRecvError, time::Instant};

    use crate::{sampler::StatelessSampler, status::Status};

    /// Sleeps for a fixed latency per attempt and tracks attempts in flight.
    #[derive(Clone)]
    struct SleepSampler {
        latency: Duration,
        attempts: Arc<AtomicU64>,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    }

    impl SleepSampler {
        fn new(latency: Duration) -> Self {
            Self {
                latency,
                attempts: Arc::default(),
                in_flight: Arc::default(),
                max_in_flight: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl StatelessSampler for SleepSampler {
        async fn sample(&mut self, _: &IterInfo) -> Sample {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.latency).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Sample::response(self.latency, Status::from_code(200), true, 0)
        }
    }

    fn opts(concurrency: u32, duration: Option<Duration>, iterations: Option<u64>, warmups: u64) -> RunOpts {
        RunOpts {
            clock: Clock::new_paused(),
            concurrency,
            duration,
            iterations,
            warmups,
            #[cfg(feature = "rate_limit")]
            rate: None,
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Sample>) -> Vec<Sample> {
        let mut samples = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(s) => samples.push(s),
                Err(TryRecvError::Empty) => panic!("channel still open after the pool returned"),
                Err(TryRecvError::Disconnected) => return samples,
            }
        }
    }

    async fn run_pool<S>(sampler: S, opts: RunOpts, cancel: CancellationToken) -> Result<Vec<Sample>>
    where
        S: Sampler + Send + 'static,
        S::WorkerState: Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();
        Runner::new(sampler, opts, tx, cancel).run().await?;
        Ok(drain(&mut rx))
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_requests_drain_after_stop() {
        // every request outlives the run, so each worker delivers exactly one sample
        let sampler = SleepSampler::new(Duration::from_millis(50));
        let opts = opts(4, Some(Duration::from_millis(10)), None, 0);
        let clock = opts.clock.clone();

        let samples = run_pool(sampler.clone(), opts, CancellationToken::new()).await.unwrap();

        assert_eq!(samples.len(), 4);
        assert!(samples.iter().all(|s| s.success));
        assert_eq!(sampler.in_flight.load(Ordering::SeqCst), 0);
        assert_eq!(sampler.max_in_flight.load(Ordering::SeqCst), 4);
        // overrun is bounded by one request per worker
        let elapsed = clock.elapsed();
        assert!(elapsed >= Duration::from_millis(50) && elapsed < Duration::from_millis(100), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_duration_stops_issuing_requests() {
        let sampler = SleepSampler::new(Duration::from_millis(10));
        let opts = opts(2, Some(Duration::from_millis(95)), None, 0);

        let samples = run_pool(sampler.clone(), opts, CancellationToken::new()).await.unwrap();

        // 10 rounds per worker: 9 complete inside the window, the 10th is in flight at 95ms
        assert_eq!(samples.len(), 20);
        assert_eq!(sampler.attempts.load(Ordering::SeqCst), 20);
        assert_eq!(sampler.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_iteration_cap() {
        let sampler = SleepSampler::new(Duration::from_millis(1));
        let samples = run_pool(sampler.clone(), opts(3, None, Some(10), 0), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(samples.len(), 10);
        assert_eq!(sampler.attempts.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_warmup_samples_are_discarded() {
        let sampler = SleepSampler::new(Duration::from_millis(1));
        let opts = opts(2, None, Some(7), 5);
        let clock = opts.clock.clone();

        let samples = run_pool(sampler.clone(), opts, CancellationToken::new()).await.unwrap();

        assert_eq!(samples.len(), 7);
        assert_eq!(sampler.attempts.load(Ordering::SeqCst), 12);
        assert!(!clock.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_cancel_stops_run() {
        let sampler = SleepSampler::new(Duration::from_millis(10));
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(35)).await;
            stopper.cancel();
        });

        let samples = run_pool(sampler.clone(), opts(1, None, None, 0), cancel).await.unwrap();

        assert_eq!(samples.len(), 4);
        assert_eq!(sampler.in_flight.load(Ordering::SeqCst), 0);
    }

    #[cfg(feature = "rate_limit")]
    #[tokio::test]
    async fn test_rate_limit_with_warmup() {
        let sampler = SleepSampler::new(Duration::from_millis(1));
        let mut opts = opts(1, Some(Duration::from_millis(300)), None, 3);
        opts.rate = Some(nonzero!(20u32));

        let samples = tokio::time::timeout(
            Duration::from_secs(5),
            run_pool(sampler.clone(), opts, CancellationToken::new()),
        )
        .await
        .expect("paced run with warm-up should finish")
        .unwrap();

        // one token every 50ms over 300ms
        assert!((2..=8).contains(&samples.len()), "{}", samples.len());
        assert_eq!(sampler.attempts.load(Ordering::SeqCst), samples.len() as u64 + 3);
    }

    /// Phases recorded by [`TrackedSampler`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Phase {
        Setup,
        Warmup,
        Measure,
    }

    /// A sampler that records phase transitions with timestamps.
    #[derive(Clone)]
    struct TrackedSampler {
        events: Arc<Mutex<Vec<(Phase, Instant)>>>,
        setup_delay: Duration,
        clock: Clock,
        fail_setup: bool,
    }

    impl TrackedSampler {
        fn new(setup_delay_ms: u64, clock: Clock) -> Self {
            Self {
                events: Arc::default(),
                setup_delay: Duration::from_millis(setup_delay_ms),
                clock,
                fail_setup: false,
            }
        }

        fn record(&self, phase: Phase) {
            self.events.lock().unwrap().push((phase, Instant::now()));
        }

        fn count(&self, phase: Phase) -> usize {
            self.events.lock().unwrap().iter().filter(|(p, _)| *p == phase).count()
        }

        /// All events of `first` happen no later than any event of `second`.
        fn verify_order(&self, first: Phase, second: Phase) -> bool {
            let events = self.events.lock().unwrap();
            let max_first = events.iter().filter(|(p, _)| *p == first).map(|(_, t)| t).max();
            let min_second = events.iter().filter(|(p, _)| *p == second).map(|(_, t)| t).min();
            match (max_first, min_second) {
                (Some(a), Some(b)) => a <= b,
                _ => true,
            }
        }
    }

    #[async_trait]
    impl Sampler for TrackedSampler {
        type WorkerState = ();

        async fn setup(&mut self, worker_id: u32) -> Result<()> {
            if worker_id == 0 {
                tokio::time::sleep(self.setup_delay).await;
                anyhow::ensure!(!self.fail_setup, "setup failed");
            }
            self.record(Phase::Setup);
            Ok(())
        }

        async fn sample(&mut self, _: &mut (), _: &IterInfo) -> Sample {
            let phase = if self.clock.is_paused() { Phase::Warmup } else { Phase::Measure };
            self.record(phase);
            tokio::time::sleep(Duration::from_micros(100)).await;
            Sample::response(Duration::from_micros(100), Status::from_code(200), true, 0)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_setup_and_warmup_precede_measurement() {
        let clock = Clock::new_paused();
        let sampler = TrackedSampler::new(50, clock.clone());
        let mut opts = opts(4, None, Some(6), 8);
        opts.clock = clock;

        let samples = run_pool(sampler.clone(), opts, CancellationToken::new()).await.unwrap();

        assert_eq!(samples.len(), 6);
        assert_eq!(sampler.count(Phase::Setup), 4);
        assert_eq!(sampler.count(Phase::Warmup), 8);
        assert_eq!(sampler.count(Phase::Measure), 6);
        assert!(sampler.verify_order(Phase::Setup, Phase::Warmup), "setup should complete before warmup");
        assert!(sampler.verify_order(Phase::Warmup, Phase::Measure), "warmup should complete before measuring");
    }

    #[tokio::test(start_paused = true)]
    async fn test_setup_failure_aborts_run() {
        let clock = Clock::new_paused();
        let mut sampler = TrackedSampler::new(10, clock.clone());
        sampler.fail_setup = true;
        let mut opts = opts(3, Some(Duration::from_secs(60)), None, 0);
        opts.clock = clock;

        let err = run_pool(sampler.clone(), opts, CancellationToken::new()).await.unwrap_err();

        assert!(err.to_string().contains("setup failed"));
        assert_eq!(sampler.count(Phase::Measure), 0);
    }
}
