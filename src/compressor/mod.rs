//! Process runner: the seam between the harness and the compression tool.
//!
//! The tool is only ever reached through the [`Compressor`] trait, so tests
//! can swap the real executable for an in-process double.

pub mod external;
pub mod header;

use crate::benchmark_utils::BenchmarkResult;
use crate::error::{HarnessError, Result};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Direction of a tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Compress,
    Decompress,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Compress => "compress",
            Mode::Decompress => "decompress",
        }
    }
}

/// Arguments of one call to the tool.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub mode: Mode,
    pub input: &'a Path,
    pub output: &'a Path,
    pub impl_key: &'a str,
    pub threads: usize,
}

/// Represents a trait for compression tools the harness can drive.
pub trait Compressor {
    /// Runs the invocation to completion and returns its wall-clock duration.
    ///
    /// A non-zero exit must come back as an error, never as a duration.
    fn run(&mut self, invocation: &Invocation) -> Result<Duration>;

    /// Returns the name of the tool, for logs.
    fn name(&self) -> &str;
}

/// Original size over compressed size; 0.0 flags an empty artifact.
pub fn compression_ratio(original_bytes: u64, compressed_bytes: u64) -> f64 {
    if compressed_bytes == 0 {
        return 0.0;
    }
    original_bytes as f64 / compressed_bytes as f64
}

/// Compresses `input` into `output` and measures the call.
///
/// Any stale file at `output` is removed first so a failed call can never be
/// mistaken for a fresh artifact.
pub fn run_compress<C: Compressor + ?Sized>(
    tool: &mut C,
    input: &Path,
    output: &Path,
    impl_key: &str,
    threads: usize,
) -> Result<BenchmarkResult> {
    remove_stale(output)?;

    let duration = tool.run(&Invocation {
        mode: Mode::Compress,
        input,
        output,
        impl_key,
        threads,
    })?;

    let original_bytes = fs::metadata(input).map_err(|e| HarnessError::io(input, e))?.len();
    let compressed_bytes = fs::metadata(output).map(|m| m.len()).unwrap_or(0);
    let compression_ratio = compression_ratio(original_bytes, compressed_bytes);

    if compression_ratio == 0.0 {
        warn!(
            output = %output.display(),
            impl_key,
            threads,
            "compressed artifact is missing or empty, ratio recorded as 0"
        );
    } else {
        match header::check_artifact(output, original_bytes) {
            Ok(header) => debug!(
                blocks = header.block_sizes.len(),
                payload_bytes = header.payload_bytes(),
                "artifact header ok"
            ),
            Err(anomaly) => {
                warn!(output = %output.display(), impl_key, threads, %anomaly, "unexpected artifact header")
            }
        }
    }

    debug!(
        impl_key,
        threads,
        duration_secs = duration.as_secs_f64(),
        compression_ratio,
        "compress finished"
    );

    Ok(BenchmarkResult {
        duration_secs: duration.as_secs_f64(),
        compression_ratio,
    })
}

/// Decompresses `input` into `output` with the given implementation.
pub fn run_decompress<C: Compressor + ?Sized>(
    tool: &mut C,
    input: &Path,
    output: &Path,
    impl_key: &str,
) -> Result<Duration> {
    remove_stale(output)?;
    tool.run(&Invocation {
        mode: Mode::Decompress,
        input,
        output,
        impl_key,
        threads: 1,
    })
}

fn remove_stale(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).map_err(|e| HarnessError::io(path, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Writes a fixed number of bytes and reports a fixed duration.
    struct FixedOutput {
        bytes: usize,
        seen_stale: bool,
    }

    impl Compressor for FixedOutput {
        fn run(&mut self, invocation: &Invocation) -> Result<Duration> {
            self.seen_stale = invocation.output.exists();
            fs::write(invocation.output, vec![1u8; self.bytes]).unwrap();
            Ok(Duration::from_millis(1500))
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct Failing;

    impl Compressor for Failing {
        fn run(&mut self, invocation: &Invocation) -> Result<Duration> {
            Err(HarnessError::ToolFailed {
                mode: invocation.mode.as_str(),
                impl_key: invocation.impl_key.to_string(),
                threads: invocation.threads,
                code: Some(2),
            })
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn ratio_is_original_over_compressed() {
        assert_eq!(compression_ratio(100, 25), 4.0);
        assert_eq!(compression_ratio(100, 0), 0.0);
        assert_eq!(compression_ratio(0, 0), 0.0);
    }

    #[test]
    fn compress_reports_duration_and_ratio() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.bin");
        let output = dir.path().join("out.pcz");
        fs::write(&input, vec![0u8; 100]).unwrap();
        fs::write(&output, b"stale").unwrap();

        let mut tool = FixedOutput { bytes: 25, seen_stale: true };
        let result = run_compress(&mut tool, &input, &output, "bsp", 4).unwrap();

        assert!(!tool.seen_stale);
        assert_eq!(result.duration_secs, 1.5);
        assert_eq!(result.compression_ratio, 4.0);
    }

    #[test]
    fn empty_artifact_yields_zero_ratio() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.bin");
        fs::write(&input, vec![0u8; 100]).unwrap();

        let mut tool = FixedOutput { bytes: 0, seen_stale: false };
        let result = run_compress(&mut tool, &input, &dir.path().join("out.pcz"), "ws", 2).unwrap();
        assert_eq!(result.compression_ratio, 0.0);
        assert!(result.is_anomalous());
    }

    #[test]
    fn tool_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.bin");
        fs::write(&input, b"data").unwrap();

        let err = run_compress(&mut Failing, &input, &dir.path().join("out.pcz"), "ws", 8).unwrap_err();
        assert!(matches!(err, HarnessError::ToolFailed { code: Some(2), threads: 8, .. }));
    }
}
