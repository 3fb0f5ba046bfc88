//! Command line interface of the load tester.
//!
//! ```shell
//! $ httpload --help
//! Usage: httpload [OPTIONS]
//!
//! Options:
//!   -u, --url <URL>                  Target url [default: http://localhost:8080/api/laptops]
//!   -d, --duration <DURATION>        Duration of the measured run [default: 10]
//!   -c, --concurrency <CONCURRENCY>  Number of workers to run concurrently [default: 16]
//!   -t, --timeout <TIMEOUT>          Timeout of a single request [default: 2]
//!       --mock                       Start the bundled mock server and load it instead of --url
//!       --mock-port <MOCK_PORT>      Port of the mock server [default: 18080]
//!       --strict                     Count every status >= 400 as a failure
//!   ...
//! ```
//!
//! [`run`] drives a whole run from parsed options. [`execute`] is the part of
//! it that wires a [`Sampler`] to the worker pool and a collector, for callers
//! that bring their own sampler.
use std::{
    fs::File,
    io::{stderr, stdout},
    net::SocketAddr,
    path::PathBuf,
};

#[cfg(feature = "rate_limit")]
use std::num::NonZeroU32;

use anyhow::{Context, Result};
use clap::{
    Parser, ValueEnum,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use crossterm::tty::IsTty;
use reqwest::Url;
use tokio::{sync::mpsc, time::Duration};
use tokio_util::sync::CancellationToken;

use crate::{
    clock::Clock,
    collector::{ProgressCollector, ReportCollector, RunMeta, SilentCollector},
    config::RunConfig,
    duration::parse_duration,
    mock::{MockResponse, MockServer},
    report::RunReport,
    reporter::{JsonReporter, RunReporter, TextReporter},
    runner::{RunOpts, Runner},
    sampler::{HttpSampler, Sampler},
    status::SuccessPolicy,
};

#[derive(Parser, Clone, Debug)]
#[clap(
    name = "httpload",
    version,
    about = "Measure throughput, latency and error rate of an HTTP endpoint",
    styles(Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Cyan.on_default())
    )
)]
#[allow(missing_docs)]
pub struct LoadCli {
    /// Target url
    #[clap(long, short = 'u', default_value = "http://localhost:8080/api/laptops")]
    pub url: Url,

    /// Duration of the measured run
    ///
    /// Seconds, possibly fractional, or a human readable span.
    ///
    /// Examples: -d 10, -d 2.5, -d 30s, -d 1m
    #[clap(long, short = 'd', default_value = "10", value_parser = parse_duration)]
    pub duration: Duration,

    /// Number of workers to run concurrently
    #[clap(long, short = 'c', default_value_t = 16)]
    pub concurrency: u32,

    /// Timeout of a single request
    ///
    /// Same syntax as --duration. A request that takes longer counts as failed.
    #[clap(long, short = 't', default_value = "2", value_parser = parse_duration)]
    pub timeout: Duration,

    /// Start the bundled mock server and load it instead of --url
    #[clap(long)]
    pub mock: bool,

    /// Port of the mock server
    #[clap(long, default_value_t = 18080)]
    pub mock_port: u16,

    /// Count every status >= 400 as a failure
    ///
    /// By default only server errors (5xx) fail a request.
    #[clap(long)]
    pub strict: bool,

    /// Number of measured requests
    ///
    /// When set, the run also stops after this many requests.
    #[clap(long, short = 'n')]
    pub iterations: Option<u64>,

    /// Number of warm-up requests to issue before measuring
    ///
    /// Warm-up requests are not included in the report.
    #[clap(long, short = 'w', default_value_t = 0)]
    pub warmup: u64,

    #[cfg(feature = "rate_limit")]
    /// Rate limit, in requests per second across all workers
    #[clap(long, short = 'r')]
    pub rate: Option<NonZeroU32>,

    /// Percentiles to report, comma separated
    #[clap(
        long,
        short = 'p',
        value_delimiter = ',',
        default_value = "50,90,95,99",
        value_parser = parse_percentage
    )]
    pub percentiles: Vec<f64>,

    /// Run in quiet mode
    ///
    /// Implies --collector silent.
    #[clap(long, short = 'q')]
    pub quiet: bool,

    /// Collector for the run
    #[clap(long, value_enum, ignore_case = true)]
    pub collector: Option<Collector>,

    /// Output format for the report
    #[clap(short, long, value_enum, default_value_t = ReportFormat::Text, ignore_case = true)]
    pub output: ReportFormat,

    /// Output file path for the report
    ///
    /// When set, the report will be written to the specified file instead of stdout.
    #[clap(long, short = 'O')]
    pub output_file: Option<PathBuf>,
}

impl LoadCli {
    /// Builds and validates the run configuration against `target`.
    pub fn run_config(&self, target: Url) -> Result<RunConfig> {
        let config = RunConfig {
            policy: if self.strict { SuccessPolicy::Strict } else { SuccessPolicy::Lenient },
            warmups: self.warmup,
            iterations: self.iterations,
            #[cfg(feature = "rate_limit")]
            rate: self.rate,
            percentiles: self.percentiles.clone(),
            ..RunConfig::new(target, self.duration, self.concurrency, self.timeout)
        };
        config.validate()?;
        Ok(config)
    }

    /// Get the actual collector type.
    pub fn collector(&self) -> Collector {
        match self.collector {
            Some(collector) => collector,
            None if self.quiet || !stderr().is_tty() => Collector::Silent,
            _ => Collector::Progress,
        }
    }
}

/// A percentage in `[0, 100]`, as a fraction.
fn parse_percentage(s: &str) -> Result<f64, String> {
    let pct: f64 = s.trim().parse().map_err(|e| format!("invalid percentile '{s}': {e}"))?;
    if !(0.0..=100.0).contains(&pct) {
        return Err(format!("percentile must be within [0, 100], got {pct}"));
    }
    Ok(pct / 100.0)
}

/// The type of sample collector.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Collector {
    /// Collector that prints progress to stderr. See [`ProgressCollector`].
    Progress,

    /// Collector that does not print anything. See [`SilentCollector`].
    Silent,
}

/// Report format.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Report in plain text format. See [`TextReporter`].
    Text,

    /// Report in JSON format. See [`JsonReporter`].
    Json,
}

/// Drives `sampler` with the pool described by `config` and returns the report.
///
/// Returns once every worker has stopped and every sample has been aggregated.
/// Cancelling `cancel` stops the run early with the same drain guarantees.
pub async fn execute<S>(
    config: &RunConfig,
    sampler: S,
    collector: Collector,
    cancel: CancellationToken,
) -> Result<RunReport>
where
    S: Sampler + Send + 'static,
    S::WorkerState: Send + 'static,
{
    let (sample_tx, sample_rx) = mpsc::unbounded_channel();

    // Paused until every worker finished setup and warm-up.
    let clock = Clock::new_paused();
    let opts = RunOpts::from_config(config, clock.clone());
    let runner = Runner::new(sampler, opts, sample_tx, cancel.clone());

    let meta = RunMeta::new(config.target.clone(), config.concurrency, clock);
    let mut collector: Box<dyn ReportCollector> = match collector {
        Collector::Progress => Box::new(ProgressCollector::new(meta, sample_rx, cancel)),
        Collector::Silent => Box::new(SilentCollector::new(meta, sample_rx, cancel)),
    };
    let report = tokio::spawn(async move { collector.run().await });

    #[cfg(feature = "tracing")]
    tracing::info!(
        target = %config.target,
        concurrency = config.concurrency,
        duration = ?config.duration,
        "starting load test"
    );

    runner.run().await?;
    let report = report.await??;

    #[cfg(feature = "tracing")]
    tracing::info!(requests = report.total_requests(), elapsed = ?report.elapsed, "load test finished");

    Ok(report.with_percentiles(config.percentiles.clone()))
}

/// Runs a load test with the given CLI options and prints the report.
pub async fn run(cli: LoadCli) -> Result<()> {
    let mock = if cli.mock {
        let addr = SocketAddr::from(([0, 0, 0, 0], cli.mock_port));
        Some(MockServer::start(addr, MockResponse::default()).await?)
    } else {
        None
    };
    let target = mock.as_ref().map_or_else(|| cli.url.clone(), MockServer::url);
    #[cfg(feature = "tracing")]
    if mock.is_some() {
        tracing::info!(url = %target, "serving mock target");
    }

    let res = load(&cli, target).await;
    if let Some(mock) = mock {
        mock.shutdown().await;
    }
    let report = res?;

    let reporter: &dyn RunReporter = match cli.output {
        ReportFormat::Text => &TextReporter,
        ReportFormat::Json => &JsonReporter,
    };
    match &cli.output_file {
        Some(path) => {
            let mut file =
                File::create(path).with_context(|| format!("failed to create report file {}", path.display()))?;
            reporter.print(&mut file, &report)?
        }
        None => reporter.print(&mut stdout(), &report)?,
    }

    Ok(())
}

async fn load(cli: &LoadCli, target: Url) -> Result<RunReport> {
    let config = cli.run_config(target)?;
    let sampler = HttpSampler::new(&config)?;
    execute(&config, sampler, cli.collector(), CancellationToken::new()).await
}

#[cfg(test)]
mod tests {
    use hyper::StatusCode;

    use super::*;
    use crate::error::ConfigError;

    fn parse(args: &[&str]) -> LoadCli {
        LoadCli::try_parse_from(std::iter::once("httpload").chain(args.iter().copied())).unwrap()
    }

    async fn mock(status: StatusCode) -> MockServer {
        let response = MockResponse { status, ..Default::default() };
        MockServer::start("127.0.0.1:0".parse().unwrap(), response).await.unwrap()
    }

    async fn load_mock(server: &MockServer, duration: Duration) -> RunReport {
        let cli = parse(&["-c", "4", "-q"]);
        let config = RunConfig { duration, ..cli.run_config(server.url()).unwrap() };
        let sampler = HttpSampler::new(&config).unwrap();
        execute(&config, sampler, Collector::Silent, CancellationToken::new()).await.unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);

        assert_eq!(cli.url.as_str(), "http://localhost:8080/api/laptops");
        assert_eq!(cli.duration, Duration::from_secs(10));
        assert_eq!(cli.concurrency, 16);
        assert_eq!(cli.timeout, Duration::from_secs(2));
        assert!(!cli.mock);
        assert_eq!(cli.mock_port, 18080);
        assert!(!cli.strict);
        assert_eq!(cli.percentiles, vec![0.5, 0.9, 0.95, 0.99]);
        assert_eq!(cli.output, ReportFormat::Text);
    }

    #[test]
    fn test_parse_options() {
        let cli = parse(&["-u", "https://example.com/x", "-d", "2.5", "-t", "300ms", "-c", "8", "--strict", "-p", "50,75", "-q"]);
        let config = cli.run_config(cli.url.clone()).unwrap();

        assert_eq!(config.target.as_str(), "https://example.com/x");
        assert_eq!(config.duration, Duration::from_millis(2500));
        assert_eq!(config.timeout, Duration::from_millis(300));
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.policy, SuccessPolicy::Strict);
        assert_eq!(config.percentiles, vec![0.5, 0.75]);
        assert_eq!(cli.collector(), Collector::Silent);
    }

    #[test]
    fn test_rejects_bad_options() {
        let bad = |args: &[&str]| LoadCli::try_parse_from(std::iter::once("httpload").chain(args.iter().copied()));

        assert!(bad(&["-d", "0"]).is_err());
        assert!(bad(&["-t", "-1"]).is_err());
        assert!(bad(&["-p", "101"]).is_err());
        assert!(bad(&["-c", "many"]).is_err());

        let cli = parse(&["-c", "0"]);
        let err = cli.run_config(cli.url.clone()).unwrap_err();
        assert!(matches!(err.downcast_ref::<ConfigError>(), Some(ConfigError::ZeroConcurrency)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_load_healthy_mock() {
        let server = mock(StatusCode::OK).await;
        let report = load_mock(&server, Duration::from_secs(1)).await;
        server.shutdown().await;

        assert!(report.total_requests() > 0);
        assert_eq!(report.failure_count(), 0);
        assert_eq!(report.success_count(), report.total_requests());
        assert_eq!(report.latencies.len() as u64, report.success_count());
        assert_eq!(report.error_rate(), 0.0);
        assert!(report.rps() > 0.0);
        assert!(report.elapsed >= Duration::from_secs(1));
        assert_eq!(report.percentiles, vec![0.5, 0.9, 0.95, 0.99]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_load_failing_mock() {
        let server = mock(StatusCode::INTERNAL_SERVER_ERROR).await;
        let report = load_mock(&server, Duration::from_millis(500)).await;
        server.shutdown().await;

        assert!(report.total_requests() > 0);
        assert_eq!(report.error_rate(), 1.0);
        assert_eq!(report.success_count(), 0);
        assert!(report.latencies.is_empty());
        assert_eq!(report.percentile(0.99), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_run_writes_report_file() {
        let path = std::env::temp_dir().join(format!("httpload-report-{}.json", std::process::id()));
        let server = mock(StatusCode::OK).await;
        let mut cli = parse(&["-d", "200ms", "-c", "2", "-q", "-o", "json"]);
        cli.url = server.url();
        cli.output_file = Some(path.clone());

        run(cli).await.unwrap();
        server.shutdown().await;

        let json: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(json["summary"]["total_requests"].as_u64().unwrap() > 0);
        assert_eq!(json["summary"]["failure_count"], 0);
    }

    #[tokio::test]
    async fn test_run_against_bundled_mock() {
        let path = std::env::temp_dir().join(format!("httpload-mock-report-{}.json", std::process::id()));
        // --url must be ignored in favour of the mock
        let mut cli = parse(&["--mock", "--mock-port", "0", "-u", "http://192.0.2.1:9/", "-d", "200ms", "-c", "2", "-q", "-o", "json"]);
        cli.output_file = Some(path.clone());

        run(cli).await.unwrap();

        let json: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();
        let target: Url = json["summary"]["target"].as_str().unwrap().parse().unwrap();
        assert_eq!(target.host_str(), Some("127.0.0.1"));
        assert_eq!(target.path(), crate::mock::MOCK_PATH);
        assert_ne!(target.port(), Some(0));
        assert!(json["summary"]["total_requests"].as_u64().unwrap() > 0);
        assert_eq!(json["summary"]["failure_count"], 0);

        // the mock is shut down once the run returns
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        assert!(client.get(target).send().await.is_err());
    }
}
