use std::time::Duration;

/// Parses a command-line duration.
///
/// Accepts plain seconds (`10`, `2.5`) or a humantime span (`500ms`, `1m30s`).
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<f64>() {
        if !secs.is_finite() || secs <= 0.0 {
            return Err(format!("'{s}' must be a positive number of seconds"));
        }
        return Duration::try_from_secs_f64(secs).map_err(|e| format!("'{s}': {e}"));
    }
    match humantime::parse_duration(s) {
        Ok(d) if d.is_zero() => Err(format!("'{s}' must be greater than zero")),
        Ok(d) => Ok(d),
        Err(e) => Err(format!("'{s}': {e}")),
    }
}

/// A duration displayed in a fixed unit, e.g. `12.34ms`.
pub struct FormattedDuration {
    duration: Duration,
    unit: TimeUnit,
}

impl FormattedDuration {
    pub fn from(duration: Duration, unit: TimeUnit) -> Self {
        Self { duration, unit }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum TimeUnit {
    Milli = 1_000_000,
    Sec = 1_000_000_000,
}

impl std::fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let unit = match self {
            TimeUnit::Milli => "ms",
            TimeUnit::Sec => "s",
        };
        write!(f, "{}", unit)
    }
}

impl std::fmt::Display for FormattedDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.duration
            .as_f64(self.unit)
            .fmt(f)
            .and_then(|_| write!(f, "{unit}", unit = self.unit))
    }
}

pub trait DurationExt {
    fn as_f64(&self, unit: TimeUnit) -> f64;
}

impl DurationExt for Duration {
    fn as_f64(&self, unit: TimeUnit) -> f64 {
        self.as_nanos() as f64 / unit as u64 as f64
    }
}
