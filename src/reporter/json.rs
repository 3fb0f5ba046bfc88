use crate::report::RunReport;

use super::{RunReporter, percentile_label};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{collections::BTreeMap, io::Write};

/// Pretty printed JSON report. Times are in seconds.
pub struct JsonReporter;

impl RunReporter for JsonReporter {
    fn print(&self, w: &mut dyn Write, report: &RunReport) -> anyhow::Result<()> {
        let counter = &report.counter;
        let summary = Summary {
            target: report.target.as_str(),
            started_at: report.started_at,
            total_time: report.elapsed.as_secs_f64(),
            concurrency: report.concurrency,

            total_requests: report.total_requests(),
            success_count: report.success_count(),
            failure_count: report.failure_count(),
            error_rate: report.error_rate(),
            rps: report.rps(),

            bytes: BytesSummary { total: counter.bytes, rate: report.bytes_rate() },
        };

        // reported even without successes, as zeros
        let latency = Latency {
            stats: LatencyStats {
                min: report.hist.min().as_secs_f64(),
                max: report.hist.max().as_secs_f64(),
                mean: report.average_latency().as_secs_f64(),
                stdev: report.hist.stdev().as_secs_f64(),
            },
            percentiles: report
                .percentile_values()
                .into_iter()
                .map(|(p, v)| (percentile_label(p), v.as_secs_f64()))
                .collect(),
            histogram: report
                .hist
                .quantiles()
                .map(|(k, v)| (k.as_secs_f64().to_string(), v))
                .collect(),
        };

        serde_json::to_writer_pretty(
            &mut *w,
            &Report {
                summary,
                latency,
                status: report.status_dist.iter().map(|(k, &v)| (k.to_string(), v)).collect(),
                errors: report.error_dist.iter().map(|(k, &v)| (k.clone(), v)).collect(),
            },
        )?;

        writeln!(w)?;
        Ok(())
    }
}

#[derive(Serialize)]
struct Summary<'a> {
    target: &'a str,
    started_at: DateTime<Utc>,
    total_time: f64,
    concurrency: u32,

    total_requests: u64,
    success_count: u64,
    failure_count: u64,
    error_rate: f64,
    rps: f64,

    bytes: BytesSummary,
}

#[derive(Serialize)]
struct BytesSummary {
    total: u64,
    rate: f64,
}

#[derive(Serialize)]
struct LatencyStats {
    min: f64,
    max: f64,
    mean: f64,
    stdev: f64,
}

#[derive(Serialize)]
struct Latency {
    stats: LatencyStats,
    percentiles: BTreeMap<String, f64>,
    histogram: BTreeMap<String, u64>,
}

#[derive(Serialize)]
struct Report<'a> {
    summary: Summary<'a>,
    latency: Latency,
    status: BTreeMap<String, u64>,
    errors: BTreeMap<String, u64>,
}
