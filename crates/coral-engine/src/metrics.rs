//! Per-step transfer metrics and the CSV report.

use std::io::Write;
use std::path::Path;

use crate::error::EngineError;

/// One received (or forwarded) step's timing and size.
#[derive(Clone, Copy, Debug)]
pub struct StepMetric {
    /// Wall-clock duration of the step, in seconds.
    pub seconds: f64,
    /// Payload carried by the step, in megabytes.
    pub megabytes: f64,
}

impl StepMetric {
    /// Throughput in MB/s.
    pub fn throughput(&self) -> f64 {
        self.megabytes / self.seconds
    }
}

/// Aggregate view over a run, computed by [`TransferMetrics::summary`].
#[derive(Clone, Copy, Debug)]
pub struct MetricsSummary {
    /// Number of steps recorded.
    pub steps: usize,
    /// Total payload in megabytes.
    pub total_megabytes: f64,
    /// Mean throughput over the whole run (total data / total elapsed).
    pub average_throughput: f64,
    /// Fastest single-step throughput in MB/s.
    pub max_throughput: f64,
    /// Slowest single-step throughput in MB/s.
    pub min_throughput: f64,
    /// Shortest step duration in seconds.
    pub min_seconds: f64,
    /// Longest step duration in seconds.
    pub max_seconds: f64,
}

/// Accumulates per-step metrics on the root participant.
#[derive(Clone, Debug, Default)]
pub struct TransferMetrics {
    rows: Vec<StepMetric>,
}

impl TransferMetrics {
    /// An empty metrics log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one step.
    pub fn record(&mut self, seconds: f64, megabytes: f64) {
        self.rows.push(StepMetric { seconds, megabytes });
    }

    /// Recorded rows in arrival order.
    pub fn rows(&self) -> &[StepMetric] {
        &self.rows
    }

    /// Aggregate statistics; `None` when nothing was recorded.
    ///
    /// `total_elapsed` is the wall-clock span of the whole run, which can
    /// exceed the sum of per-step durations when the stream idles.
    pub fn summary(&self, total_elapsed: f64) -> Option<MetricsSummary> {
        if self.rows.is_empty() {
            return None;
        }
        let total_megabytes: f64 = self.rows.iter().map(|r| r.megabytes).sum();
        let throughputs: Vec<f64> = self.rows.iter().map(StepMetric::throughput).collect();
        let seconds: Vec<f64> = self.rows.iter().map(|r| r.seconds).collect();
        Some(MetricsSummary {
            steps: self.rows.len(),
            total_megabytes,
            average_throughput: total_megabytes / total_elapsed,
            max_throughput: throughputs.iter().cloned().fold(f64::MIN, f64::max),
            min_throughput: throughputs.iter().cloned().fold(f64::MAX, f64::min),
            min_seconds: seconds.iter().cloned().fold(f64::MAX, f64::min),
            max_seconds: seconds.iter().cloned().fold(f64::MIN, f64::max),
        })
    }

    /// Write the CSV report: a fixed header plus one row per step.
    pub fn write_csv<W: Write>(&self, mut w: W) -> Result<(), EngineError> {
        let io = |e: std::io::Error| EngineError::Config {
            reason: format!("metrics write failed: {e}"),
        };
        writeln!(w, "Step,Time(s),Size(MB),Throughput(MB/s),Throughput(Mbps)").map_err(io)?;
        for (i, row) in self.rows.iter().enumerate() {
            writeln!(
                w,
                "{i},{:.6},{:.2},{:.2},{:.2}",
                row.seconds,
                row.megabytes,
                row.throughput(),
                row.throughput() * 8.0
            )
            .map_err(io)?;
        }
        Ok(())
    }

    /// Write the CSV report to a file.
    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        let file = std::fs::File::create(path).map_err(|e| EngineError::Config {
            reason: format!("cannot create {}: {e}", path.display()),
        })?;
        self.write_csv(std::io::BufWriter::new(file))
    }
}

/// Megabytes carried by `elements` f64 cells.
pub(crate) fn megabytes_f64(elements: usize) -> f64 {
    (elements * std::mem::size_of::<f64>()) as f64 / (1024.0 * 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_header_and_rows() {
        let mut metrics = TransferMetrics::new();
        metrics.record(0.5, 16.0);
        metrics.record(2.0, 16.0);

        let mut out = Vec::new();
        metrics.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Step,Time(s),Size(MB),Throughput(MB/s),Throughput(Mbps)"
        );
        assert_eq!(lines.next().unwrap(), "0,0.500000,16.00,32.00,256.00");
        assert_eq!(lines.next().unwrap(), "1,2.000000,16.00,8.00,64.00");
        assert!(lines.next().is_none());
    }

    #[test]
    fn summary_aggregates() {
        let mut metrics = TransferMetrics::new();
        metrics.record(1.0, 10.0);
        metrics.record(2.0, 10.0);
        let s = metrics.summary(4.0).unwrap();
        assert_eq!(s.steps, 2);
        assert_eq!(s.total_megabytes, 20.0);
        assert_eq!(s.average_throughput, 5.0);
        assert_eq!(s.max_throughput, 10.0);
        assert_eq!(s.min_throughput, 5.0);
        assert_eq!(s.min_seconds, 1.0);
        assert_eq!(s.max_seconds, 2.0);
    }

    #[test]
    fn empty_log_has_no_summary() {
        assert!(TransferMetrics::new().summary(1.0).is_none());
    }

    #[test]
    fn megabyte_conversion() {
        // 131072 doubles = 1 MiB.
        assert_eq!(megabytes_f64(131_072), 1.0);
    }
}
