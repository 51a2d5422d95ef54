use clap::Parser;
use pcz_speedup_bench::benchmark::Orchestrator;
use pcz_speedup_bench::compressor::external::{build_tool, ExternalCompressor};
use pcz_speedup_bench::config::BenchConfig;
use pcz_speedup_bench::error::Result;
use pcz_speedup_bench::plot::PlottersSink;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Measures parallel compression speedups of the pczip tool.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// JSON configuration file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Compression tool executable
    #[arg(long)]
    exe: Option<PathBuf>,

    /// Directory for corpora, artifacts, charts and the report
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Corpus size in MiB
    #[arg(long)]
    size_mb: Option<u64>,

    /// Ascending thread counts, e.g. 2,4,8
    #[arg(long, value_delimiter = ',')]
    threads: Option<Vec<usize>>,

    /// Compress calls per thread count
    #[arg(long)]
    iterations: Option<usize>,

    /// Seed of the mixed corpus
    #[arg(long)]
    seed: Option<u64>,

    /// Kill a tool call after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Where to write the JSON report, relative to the work dir
    #[arg(long)]
    report: Option<PathBuf>,

    /// TrueType font used for chart text
    #[arg(long)]
    font: Option<PathBuf>,

    /// Skip chart rendering
    #[arg(long)]
    no_charts: bool,

    /// Command that builds the tool first, e.g. "go build -o pczip main.go"
    #[arg(long)]
    build: Option<String>,
}

impl Args {
    fn into_config(self) -> Result<BenchConfig> {
        let mut config = match &self.config {
            Some(path) => BenchConfig::load(path)?,
            None => BenchConfig::default(),
        };

        if let Some(exe) = self.exe {
            config.executable = exe;
        }
        if let Some(dir) = self.work_dir {
            config.work_dir = dir;
        }
        if let Some(size) = self.size_mb {
            config.file_size_mb = size;
        }
        if let Some(threads) = self.threads {
            config.thread_counts = threads;
        }
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if self.timeout_secs.is_some() {
            config.timeout_secs = self.timeout_secs;
        }
        if self.report.is_some() {
            config.report_path = self.report;
        }
        if self.font.is_some() {
            config.chart_font = self.font;
        }
        if self.no_charts {
            config.charts = false;
        }
        if let Some(build) = self.build {
            config.build_command = Some(build.split_whitespace().map(str::to_string).collect());
        }

        config.validate()?;
        Ok(config)
    }
}

fn run(config: &BenchConfig) -> Result<()> {
    if let Some(command) = &config.build_command {
        build_tool(command, &config.work_dir)?;
    }

    let tool = ExternalCompressor::new(&config.executable).with_timeout(config.timeout());
    info!(exe = %tool.executable().display(), work_dir = %config.work_dir.display(), "using compression tool");
    let charts = PlottersSink::new(config.chart_font.as_deref());

    let report = Orchestrator::new(config, tool, charts).run()?;
    let charts_written: usize = report.datasets.iter().map(|d| d.charts.len()).sum();
    info!(datasets = report.datasets.len(), charts = charts_written, "benchmark complete");
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let outcome = Args::parse().into_config().and_then(|config| run(&config));
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "speedup benchmark failed");
            ExitCode::FAILURE
        }
    }
}
