use crossterm::style::{StyledContent, Stylize};
use itertools::Itertools;
use std::{cmp::Reverse, collections::HashMap, io::Write};
use tabled::settings::object::{Cell, Columns, FirstColumn, LastColumn, Rows};
use tabled::settings::Padding;
use tabled::{
    builder::Builder,
    settings::{themes::Colorization, Alignment, Color, Margin, Style},
};

use crate::{
    duration::{FormattedDuration, TimeUnit},
    histogram::LatencyHistogram,
    report::RunReport,
    status::{Status, StatusKind},
    util::{IntoAdjustedByte, TryIntoAdjustedByte},
};

/// Human readable report. Latencies are shown in milliseconds.
pub struct TextReporter;

impl super::RunReporter for TextReporter {
    fn print(&self, w: &mut dyn Write, report: &RunReport) -> anyhow::Result<()> {
        print_summary(w, report)?;
        writeln!(w)?;

        print_latency(w, report)?;
        writeln!(w)?;

        if !report.status_dist.is_empty() {
            print_status(w, &report.status_dist)?;
            writeln!(w)?;
        }

        print_error(w, &report.error_dist)?;

        Ok(())
    }
}

fn ms(d: std::time::Duration) -> String {
    format!("{:.2}", FormattedDuration::from(d, TimeUnit::Milli))
}

fn render_error_rate(error_rate: f64) -> StyledContent<String> {
    let text = format!("{:.2}%", error_rate);
    if error_rate <= 0.0 {
        text.green().bold()
    } else if error_rate <= 1.0 {
        text.yellow().bold()
    } else {
        text.red().bold()
    }
}

#[rustfmt::skip]
fn print_summary(w: &mut dyn Write, report: &RunReport) -> anyhow::Result<()> {
    let counter = &report.counter;

    writeln!(w, "{}", "Summary".h1())?;
    writeln!(w,       "  Target:        {}", report.target.as_str().green().bold())?;
    writeln!(w,       "  Duration:      {}", format!("{:.2}", FormattedDuration::from(report.elapsed, TimeUnit::Sec)).green().bold())?;
    writeln!(w,       "  Concurrency:   {}", report.concurrency.to_string().green().bold())?;
    writeln!(w,       "  Error rate:    {}", render_error_rate(100.0 * report.error_rate()))?;
    writeln!(w)?;

    let stats = vec![
        vec!["".into(), "Total".into(), "Rate".into()],
        vec!["Requests".into(), report.total_requests().to_string(), format!("{:.2}/s", report.rps())],
        vec!["Success".into(), report.success_count().to_string(), "".into()],
        vec!["Failure".into(), report.failure_count().to_string(), "".into()],
        vec![
            "Bytes".into(),
            format!("{:.2}", counter.bytes.to_bytes()),
            format!("{:.2}/s", report.bytes_rate().to_bytes()?),
        ],
    ];
    let mut stats = Builder::from(stats).build();
    stats
        .with(Style::empty())
        .with(Alignment::center())
        .with(Padding::new(2, 2, 0, 0))
        .with(Colorization::exact([Color::BOLD], Rows::first()))
        .with(Colorization::exact([Color::FG_GREEN], Rows::new(1..=2)))
        .with(Colorization::exact([Color::FG_GREEN], Rows::new(4..=4)));
    if report.failure_count() > 0 {
        stats.with(Colorization::exact([Color::FG_RED], Cell::new(3, 1)));
    } else {
        stats.with(Colorization::exact([Color::FG_GREEN], Cell::new(3, 1)));
    }

    writeln!(w, "{}", stats)?;
    Ok(())
}

fn print_latency(w: &mut dyn Write, report: &RunReport) -> anyhow::Result<()> {
    writeln!(w, "{}", "Latencies (successful requests)".h1())?;

    // all zero without successes
    print_latency_stats(w, report)?;
    writeln!(w)?;

    writeln!(w, "{}", "  Percentiles".h2())?;
    print_latency_percentiles(w, report)?;

    if !report.hist.is_empty() {
        writeln!(w)?;
        writeln!(w, "{}", "  Histogram".h2())?;
        print_latency_histogram(w, &report.hist, 2)?;
    }

    Ok(())
}

fn print_latency_stats(w: &mut dyn Write, report: &RunReport) -> anyhow::Result<()> {
    let hist = &report.hist;
    let stats = vec![
        vec!["Avg".into(), "Min".into(), "Med".into(), "Max".into(), "Stdev".into()],
        vec![
            ms(report.average_latency()),
            ms(hist.min()),
            ms(report.percentile(0.5)),
            ms(hist.max()),
            ms(hist.stdev()),
        ],
    ];
    let mut stats = Builder::from(stats).build();
    stats
        .with(Style::empty())
        .with(Margin::new(1, 0, 0, 0))
        .with(Alignment::center())
        .with(Colorization::exact([Color::FG_GREEN], Rows::new(1..=1)))
        .with(Colorization::exact([Color::FG_BLUE], Cell::new(0, 0)))
        .with(Colorization::exact([Color::FG_CYAN], Cell::new(0, 1)))
        .with(Colorization::exact([Color::FG_YELLOW], Cell::new(0, 2)))
        .with(Colorization::exact([Color::FG_RED], Cell::new(0, 3)))
        .with(Colorization::exact([Color::FG_MAGENTA], Cell::new(0, 4)));
    writeln!(w, "{}", stats)?;
    Ok(())
}

fn print_latency_percentiles(w: &mut dyn Write, report: &RunReport) -> anyhow::Result<()> {
    let percentiles = report
        .percentile_values()
        .into_iter()
        .map(|(p, v)| vec![super::percentile_label(p), " in ".to_string(), ms(v)]);
    let mut percentiles = Builder::from_iter(percentiles).build();
    percentiles
        .with(Style::empty())
        .with(Margin::new(3, 0, 0, 0))
        .with(Alignment::left())
        .with(Padding::zero())
        .with(Colorization::exact([Color::FG_GREEN], FirstColumn))
        .with(Colorization::exact([Color::FG_GREEN], LastColumn))
        .modify(LastColumn, Alignment::right());
    writeln!(w, "{}", percentiles)?;
    Ok(())
}

fn print_latency_histogram(w: &mut dyn Write, hist: &LatencyHistogram, indent: usize) -> anyhow::Result<()> {
    let quantiles = hist.quantiles().map(|(latency, count)| (ms(latency), count)).collect_vec();
    let Some(&max_count) = quantiles.iter().map(|(_, count)| count).max() else {
        return Ok(());
    };

    let quantiles = quantiles
        .into_iter()
        .map(|(latency, count)| vec![count.to_string(), latency, "│".into(), render_bar(count, max_count)]);
    let mut quantiles = Builder::from_iter(quantiles).build();
    quantiles
        .with(Style::empty())
        .with(Margin::new(indent * 2, 0, 0, 0))
        .with(Alignment::right())
        .with(Padding::new(0, 1, 0, 0))
        .with(Colorization::exact([Color::FG_GREEN], Columns::new(0..=1)))
        .with(Colorization::exact([Color::FG_GREEN], LastColumn))
        .modify(Columns::new(2..=2), Padding::new(0, 0, 0, 0))
        .modify(LastColumn, Alignment::left())
        .modify(FirstColumn, Padding::new(1, 1, 0, 0).fill('[', ']', ' ', ' '))
        .modify(Columns::new(1..=1), Padding::new(1, 1, 0, 0));
    writeln!(w, "{}", quantiles)?;

    Ok(())
}

fn render_bar(count: u64, max_count: u64) -> String {
    let ratio = count as f64 / max_count as f64;
    let len = 32.0 * ratio;
    let mut bar = "■".repeat(len as usize);
    if len.fract() >= 0.5 {
        bar.push('◧');
    }
    bar
}

fn print_status(w: &mut dyn Write, status: &HashMap<Status, u64>) -> anyhow::Result<()> {
    writeln!(w, "{}", "Status distribution".h1())?;
    let status_v = status.iter().sorted_unstable_by_key(|&(s, &cnt)| (Reverse(cnt), *s)).collect_vec();
    let Some(max) = status_v.iter().map(|(_, count)| **count).max() else {
        return Ok(());
    };

    let count_width = max.to_string().len();
    for (&status, count) in status_v {
        let count = format!("{count:>count_width$}").green();
        let status = match status.kind() {
            StatusKind::Success => status.to_string().green(),
            StatusKind::Other | StatusKind::ClientError => status.to_string().yellow(),
            StatusKind::ServerError => status.to_string().red(),
        };
        writeln!(w, "  [{count}] {status}")?;
    }
    Ok(())
}

fn print_error(w: &mut dyn Write, errors: &HashMap<String, u64>) -> anyhow::Result<()> {
    let error_v = errors.iter().sorted_unstable_by_key(|&(e, &cnt)| (Reverse(cnt), e)).collect_vec();
    let Some(max) = error_v.iter().map(|(_, count)| **count).max() else {
        return Ok(());
    };

    let count_width = max.to_string().len();
    writeln!(w, "{}", "Error distribution".h1())?;
    for (error, count) in error_v {
        writeln!(w, "{}", format!("  [{count:>count_width$}] {error}").red())?;
    }
    Ok(())
}

trait ReportStyle {
    fn h1(&self) -> StyledContent<&str>;
    fn h2(&self) -> StyledContent<&str>;
}

impl<T: AsRef<str>> ReportStyle for T {
    fn h1(&self) -> StyledContent<&str> {
        self.as_ref().bold().underlined().yellow()
    }

    fn h2(&self) -> StyledContent<&str> {
        self.as_ref().bold().cyan()
    }
}
