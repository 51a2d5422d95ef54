use clap::Parser;
use pcz_speedup_bench::config::mib_to_bytes;
use pcz_speedup_bench::dataset::{Dataset, DatasetKind};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Writes one synthetic corpus without running any benchmark.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// fragmented or realworld_mixed
    kind: String,

    /// Size in MiB
    size_mb: u64,

    /// Output directory; the file is named <kind>.bin
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Seed of the mixed corpus
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();
    let Some(kind) = DatasetKind::from_key(&args.kind) else {
        eprintln!("Error: unknown dataset '{}'. Expected one of: fragmented, realworld_mixed", args.kind);
        return ExitCode::FAILURE;
    };

    let generated = mib_to_bytes(args.size_mb).and_then(|size| Dataset::generate(kind, &args.dir, size, args.seed));
    match generated {
        Ok(dataset) => {
            println!("{} ({} bytes) -> {}", dataset.label(), dataset.size_bytes, dataset.path.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "dataset generation failed");
            ExitCode::FAILURE
        }
    }
}
