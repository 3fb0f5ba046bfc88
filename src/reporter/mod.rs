//! Printers for the final run report.
mod json;
mod text;

pub use json::JsonReporter;
pub use text::TextReporter;

use crate::report::RunReport;

/// A trait for printing run reports.
pub trait RunReporter {
    /// Print the report to the given writer.
    fn print(&self, w: &mut dyn std::io::Write, report: &RunReport) -> anyhow::Result<()>;
}

/// `p50`, `p99.9`: a percentile fraction as shown to users.
fn percentile_label(p: f64) -> String {
    let pct = (p * 100.0 * 1000.0).round() / 1000.0;
    format!("p{pct}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_label() {
        assert_eq!(percentile_label(0.5), "p50");
        assert_eq!(percentile_label(0.29), "p29");
        assert_eq!(percentile_label(0.999), "p99.9");
        assert_eq!(percentile_label(1.0), "p100");
    }
}
