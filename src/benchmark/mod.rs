//! Drives the (dataset, implementation, threads, iteration) matrix.
//!
//! Per dataset the stages run strictly in order: generate, baseline, verify,
//! sweep, aggregate, plot. A failed verification or tool call aborts the
//! whole run. Artifacts are removed once at the end whatever happened.

use crate::artifacts::{ArtifactTracker, ARTIFACT_EXTENSION};
use crate::benchmark_utils::{print_dataset_report, DatasetReport, RunReport, SpeedupSeries, SweepPoint};
use crate::compressor::{run_compress, Compressor};
use crate::config::BenchConfig;
use crate::dataset::{Dataset, DatasetKind};
use crate::error::{HarnessError, Result};
use crate::plot::{comparison_chart_path, implementation_chart_path, ChartSink, SpeedupChart};
use crate::verify::verify_integrity;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, error, info, info_span, warn};

/// Name of the decoded file written during verification.
pub const INTEGRITY_SCRATCH: &str = "check_integrity.bin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Generate,
    Baseline,
    Verify,
    Sweep,
    Aggregate,
    Plot,
    Cleanup,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Generate => "generate",
            Stage::Baseline => "baseline",
            Stage::Verify => "verify",
            Stage::Sweep => "sweep",
            Stage::Aggregate => "aggregate",
            Stage::Plot => "plot",
            Stage::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// One sweep invocation; its artifact name is unique within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSpec<'a> {
    pub dataset: &'a str,
    pub impl_key: &'a str,
    pub threads: usize,
    pub iteration: usize,
}

impl RunSpec<'_> {
    pub fn artifact_name(&self) -> String {
        format!(
            "output_{}_{}_{}_{}.{}",
            self.impl_key, self.dataset, self.threads, self.iteration, ARTIFACT_EXTENSION
        )
    }
}

pub fn baseline_artifact_name(baseline_key: &str, dataset: &str) -> String {
    format!("output_{}_{}.{}", baseline_key, dataset, ARTIFACT_EXTENSION)
}

pub struct Orchestrator<'a, C: Compressor, S: ChartSink> {
    config: &'a BenchConfig,
    tool: C,
    charts: S,
}

impl<'a, C: Compressor, S: ChartSink> Orchestrator<'a, C, S> {
    pub fn new(config: &'a BenchConfig, tool: C, charts: S) -> Self {
        Orchestrator { config, tool, charts }
    }

    pub fn tool(&self) -> &C {
        &self.tool
    }

    pub fn charts(&self) -> &S {
        &self.charts
    }

    /// Runs every dataset, then removes all artifacts, also when a stage failed.
    pub fn run(&mut self) -> Result<RunReport> {
        self.config.validate()?;

        info!(
            tool = self.tool.name(),
            datasets = self.config.datasets.len(),
            implementations = self.config.implementations.len(),
            "starting benchmark"
        );

        let mut tracker = ArtifactTracker::new(&self.config.work_dir);
        let outcome = self.run_datasets(&mut tracker);
        let removed = tracker.cleanup();
        info!(stage = %Stage::Cleanup, removed, "artifacts removed");

        if let Err(err) = &outcome {
            error!(error = %err, "benchmark aborted");
        }
        outcome
    }

    fn run_datasets(&mut self, tracker: &mut ArtifactTracker) -> Result<RunReport> {
        let config = self.config;
        let mut report = RunReport::default();

        for &kind in &config.datasets {
            let span = info_span!("dataset", key = kind.key());
            let _entered = span.enter();

            let dataset_report = self.run_dataset(kind, tracker)?;
            print_dataset_report(&dataset_report);
            report.datasets.push(dataset_report);
        }

        if let Some(report_path) = &config.report_path {
            let path = config.work_dir.join(report_path);
            report.write_json(&path)?;
            info!(path = %path.display(), "report written");
        }
        Ok(report)
    }

    fn run_dataset(&mut self, kind: DatasetKind, tracker: &mut ArtifactTracker) -> Result<DatasetReport> {
        let config = self.config;
        let work_dir = &config.work_dir;

        info!(stage = %Stage::Generate, size_mb = config.file_size_mb, "generating corpus");
        let dataset = Dataset::generate(kind, work_dir, config.file_size_bytes()?, config.seed)?;

        let baseline_key = config.baseline.key.as_str();
        let baseline_path = work_dir.join(baseline_artifact_name(baseline_key, dataset.key()));
        tracker.track(&baseline_path);
        let baseline = run_compress(&mut self.tool, &dataset.path, &baseline_path, baseline_key, 1)?;
        info!(
            stage = %Stage::Baseline,
            duration_secs = baseline.duration_secs,
            compression_ratio = baseline.compression_ratio,
            "baseline measured"
        );

        let scratch = work_dir.join(INTEGRITY_SCRATCH);
        let verified = verify_integrity(&mut self.tool, baseline_key, &dataset.path, &baseline_path, &scratch)?;
        if !verified {
            error!(stage = %Stage::Verify, "round trip failed, aborting run");
            return Err(HarnessError::IntegrityMismatch {
                dataset: dataset.key().to_string(),
            });
        }

        let series = self.sweep(&dataset, baseline.duration_secs, tracker)?;
        debug!(stage = %Stage::Aggregate, implementations = series.len(), "speedups collected");

        let charts = if config.charts {
            self.plot(&dataset, &series)
        } else {
            Vec::new()
        };

        Ok(DatasetReport {
            dataset_key: dataset.key().to_string(),
            dataset_label: dataset.label().to_string(),
            size_bytes: dataset.size_bytes,
            baseline,
            series,
            charts,
        })
    }

    fn sweep(
        &mut self,
        dataset: &Dataset,
        baseline_secs: f64,
        tracker: &mut ArtifactTracker,
    ) -> Result<Vec<SpeedupSeries>> {
        let config = self.config;
        let mut all = Vec::with_capacity(config.implementations.len());

        for implementation in &config.implementations {
            let mut points = Vec::with_capacity(config.thread_counts.len());

            for &threads in &config.thread_counts {
                let mut results = Vec::with_capacity(config.iterations);
                for iteration in 0..config.iterations {
                    let spec = RunSpec {
                        dataset: dataset.key(),
                        impl_key: &implementation.key,
                        threads,
                        iteration,
                    };
                    let output = config.work_dir.join(spec.artifact_name());
                    tracker.track(&output);
                    results.push(run_compress(&mut self.tool, &dataset.path, &output, &implementation.key, threads)?);
                }

                let point = SweepPoint::from_iterations(threads, baseline_secs, &results);
                info!(
                    stage = %Stage::Sweep,
                    impl_key = %implementation.key,
                    threads,
                    average_secs = point.average_secs,
                    speedup = point.speedup,
                    last_ratio = point.last_ratio,
                    "thread count measured"
                );
                points.push(point);
            }

            all.push(SpeedupSeries {
                impl_key: implementation.key.clone(),
                impl_label: implementation.label.clone(),
                points,
            });
        }

        Ok(all)
    }

    /// Renders per-implementation charts and the comparison chart.
    ///
    /// A chart that fails to render is logged and left out of the report.
    fn plot(&mut self, dataset: &Dataset, series: &[SpeedupSeries]) -> Vec<PathBuf> {
        let config = self.config;
        let dir = &config.work_dir;
        let mut jobs = Vec::with_capacity(series.len() + 1);

        for s in series {
            jobs.push((
                SpeedupChart::for_implementation(dataset.label(), config.file_size_mb, s),
                implementation_chart_path(dir, &s.impl_key, dataset.key()),
            ));
        }
        jobs.push((
            SpeedupChart::comparison(dataset.label(), config.file_size_mb, &config.thread_counts, series),
            comparison_chart_path(dir, dataset.key()),
        ));

        let mut written = Vec::with_capacity(jobs.len());
        for (chart, path) in jobs {
            match self.charts.render(&chart, &path) {
                Ok(()) => {
                    info!(stage = %Stage::Plot, path = %path.display(), "chart rendered");
                    written.push(path);
                }
                Err(err) => warn!(stage = %Stage::Plot, error = %err, "chart skipped"),
            }
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_names_follow_convention() {
        let spec = RunSpec {
            dataset: "fragmented",
            impl_key: "ws",
            threads: 8,
            iteration: 2,
        };
        assert_eq!(spec.artifact_name(), "output_ws_fragmented_8_2.pcz");
        assert_eq!(baseline_artifact_name("seq", "realworld_mixed"), "output_seq_realworld_mixed.pcz");
    }

    #[test]
    fn stages_display_lowercase() {
        assert_eq!(Stage::Verify.to_string(), "verify");
        assert_eq!(Stage::Cleanup.to_string(), "cleanup");
    }
}
