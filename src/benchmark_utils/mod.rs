use prettytable::{row, Table};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{HarnessError, Result};

/// Timing and ratio of one compress call.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct BenchmarkResult {
    pub duration_secs: f64,
    pub compression_ratio: f64, // 0.0 when the artifact was missing or empty
}

impl BenchmarkResult {
    /// A zero ratio means the measurement cannot be trusted.
    pub fn is_anomalous(&self) -> bool {
        self.compression_ratio == 0.0
    }
}

/// Baseline duration over the average duration; 0.0 guards a zero average.
pub fn speedup(baseline_secs: f64, average_secs: f64) -> f64 {
    if average_secs > 0.0 {
        baseline_secs / average_secs
    } else {
        0.0
    }
}

/// One thread count of a sweep.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SweepPoint {
    pub threads: usize,
    pub average_secs: f64,
    pub speedup: f64,
    pub last_ratio: f64, // ratio of the last iteration only, not averaged
}

impl SweepPoint {
    /// Folds the iterations measured at `threads` into one point.
    pub fn from_iterations(threads: usize, baseline_secs: f64, results: &[BenchmarkResult]) -> Self {
        let total: f64 = results.iter().map(|r| r.duration_secs).sum();
        let average_secs = if results.is_empty() { 0.0 } else { total / results.len() as f64 };
        SweepPoint {
            threads,
            average_secs,
            speedup: speedup(baseline_secs, average_secs),
            last_ratio: results.last().map(|r| r.compression_ratio).unwrap_or(0.0),
        }
    }
}

/// Speedups of one implementation on one dataset, in thread-count order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SpeedupSeries {
    pub impl_key: String,
    pub impl_label: String,
    pub points: Vec<SweepPoint>,
}

impl SpeedupSeries {
    pub fn thread_counts(&self) -> Vec<usize> {
        self.points.iter().map(|p| p.threads).collect()
    }

    pub fn speedups(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.speedup).collect()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DatasetReport {
    pub dataset_key: String,
    pub dataset_label: String,
    pub size_bytes: u64,
    pub baseline: BenchmarkResult,
    pub series: Vec<SpeedupSeries>,
    pub charts: Vec<PathBuf>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub datasets: Vec<DatasetReport>,
}

impl RunReport {
    /// Writes the report as pretty JSON, replacing any previous report.
    pub fn write_json(&self, file_path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(file_path, json).map_err(|e| HarnessError::io(file_path, e))
    }

    pub fn read_json(file_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(file_path).map_err(|e| HarnessError::io(file_path, e))?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Print the sweep of one dataset, one table per implementation.
pub fn print_dataset_report(report: &DatasetReport) {
    println!(
        "\nDataset: {} ({:.2} MB), sequential baseline {:.3} s, ratio {:.3}",
        report.dataset_label,
        report.size_bytes as f64 / (1024.0 * 1024.0),
        report.baseline.duration_secs,
        report.baseline.compression_ratio
    );

    for series in &report.series {
        let mut table = Table::new();
        table.add_row(row!["Threads", "Avg Time (s)", "Speedup", "Comp Rate (last)"]);

        for point in &series.points {
            let ratio = if point.last_ratio == 0.0 {
                "0.000 (anomalous)".to_string()
            } else {
                format!("{:.3}", point.last_ratio)
            };
            table.add_row(row![
                point.threads,
                format!("{:.3}", point.average_secs),
                format!("{:.2}x", point.speedup),
                ratio,
            ]);
        }

        if let Some(best) = series.points.iter().max_by(|a, b| a.speedup.total_cmp(&b.speedup)) {
            table.add_row(row![
                "BEST",
                format!("{:.3}", best.average_secs),
                format!("{:.2}x @ {}", best.speedup, best.threads),
                "",
            ]);
        }

        println!("\nResults for Implementation: {}", series.impl_label);
        table.printstd();
    }
}
