//! Samplers perform single timed request attempts.
//!
//! [`Sampler`] is the seam between the worker pool and whatever is being
//! measured. The pool only ever sees [`Sample`]s: a sampler never fails, it
//! records the failure in the sample it returns.
use std::error::Error as _;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Url};
use tokio::time::{Duration, Instant, timeout};

use crate::{
    config::RunConfig,
    error::ConfigError,
    runner::IterInfo,
    sample::Sample,
    status::{Status, SuccessPolicy},
};

/// A source of samples for the worker pool.
#[async_trait]
pub trait Sampler: Clone {
    /// The state owned by each worker during the run.
    type WorkerState: Send;

    /// Setup procedure before each worker starts.
    async fn setup(&mut self, worker_id: u32) -> Result<Self::WorkerState>;

    /// Perform exactly one attempt and measure it.
    async fn sample(&mut self, state: &mut Self::WorkerState, info: &IterInfo) -> Sample;
}

/// A sampler without per-worker state.
#[async_trait]
pub trait StatelessSampler {
    /// Perform exactly one attempt and measure it.
    async fn sample(&mut self, info: &IterInfo) -> Sample;
}

#[async_trait]
impl<T> Sampler for T
where
    T: StatelessSampler + Clone + Send + Sync + 'static,
{
    type WorkerState = ();

    async fn setup(&mut self, _worker_id: u32) -> Result<()> {
        Ok(())
    }

    async fn sample(&mut self, _: &mut Self::WorkerState, info: &IterInfo) -> Sample {
        StatelessSampler::sample(self, info).await
    }
}

/// Issues one `GET` per sample against a fixed url.
///
/// Workers share a single connection pool; the latency of a sample spans
/// from just before the request is sent until its body has been drained.
#[derive(Clone, Debug)]
pub struct HttpSampler {
    url: Url,
    timeout: Duration,
    policy: SuccessPolicy,
    client: Client,
}

impl HttpSampler {
    /// Builds a sampler for the target, timeout and policy of `config`.
    pub fn new(config: &RunConfig) -> Result<Self, ConfigError> {
        let client = Client::builder().no_proxy().build().map_err(ConfigError::Client)?;
        Ok(Self { url: config.target.clone(), timeout: config.timeout, policy: config.policy, client })
    }
}

#[async_trait]
impl Sampler for HttpSampler {
    type WorkerState = Client;

    async fn setup(&mut self, _worker_id: u32) -> Result<Client> {
        Ok(self.client.clone())
    }

    async fn sample(&mut self, client: &mut Client, _: &IterInfo) -> Sample {
        let t = Instant::now();
        let attempt = async {
            let resp = client.get(self.url.clone()).send().await?;
            let status = resp.status();
            let body = resp.bytes().await?;
            Ok::<_, reqwest::Error>((status, body.len() as u64))
        };

        let res = timeout(self.timeout, attempt).await;
        let latency = t.elapsed();

        match res {
            Ok(Ok((status, bytes))) => {
                let status = Status::from(status);
                Sample::response(latency, status, self.policy.is_success(status), bytes)
            }
            Ok(Err(e)) if e.is_timeout() => Sample::timeout(latency),
            Ok(Err(e)) => Sample::transport(latency, describe(&e)),
            Err(_) => Sample::timeout(latency),
        }
    }
}

/// A short, url-free description of a transport error, stable enough to group by.
fn describe(e: &reqwest::Error) -> String {
    let kind = if e.is_connect() {
        "connect error"
    } else if e.is_body() || e.is_decode() {
        "body error"
    } else if e.is_request() {
        "request error"
    } else {
        "transport error"
    };

    let mut source = e.source();
    let mut root = None;
    while let Some(s) = source {
        root = Some(s);
        source = s.source();
    }
    match root {
        Some(root) => format!("{kind}: {root}"),
        None => kind.to_string(),
    }
}
