//! Run configuration for the speedup benchmark.
//!
//! Every field has a default so a JSON config file only needs to list what
//! it changes. CLI flags are applied on top by the binaries before
//! [`BenchConfig::validate`] is called.

use crate::dataset::DatasetKind;
use crate::error::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const MIB: u64 = 1024 * 1024;

/// Converts a size in MiB to bytes, refusing sizes that do not fit in a `u64`.
pub fn mib_to_bytes(size_mb: u64) -> Result<u64> {
    size_mb
        .checked_mul(MIB)
        .ok_or_else(|| HarnessError::Config(format!("file size of {} MiB is too large", size_mb)))
}

/// An implementation key understood by the external tool plus a label for charts.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ImplementationSpec {
    pub key: String,
    pub label: String,
}

impl ImplementationSpec {
    pub fn new(key: &str, label: &str) -> Self {
        ImplementationSpec {
            key: key.to_string(),
            label: label.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct BenchConfig {
    pub executable: PathBuf,
    pub build_command: Option<Vec<String>>,
    pub work_dir: PathBuf,
    pub file_size_mb: u64,
    pub thread_counts: Vec<usize>,
    pub iterations: usize,
    pub baseline: ImplementationSpec,
    pub implementations: Vec<ImplementationSpec>,
    pub datasets: Vec<DatasetKind>,
    pub seed: u64,
    pub timeout_secs: Option<u64>,
    pub report_path: Option<PathBuf>,
    pub charts: bool,
    pub chart_font: Option<PathBuf>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        BenchConfig {
            executable: default_executable(),
            build_command: None,
            work_dir: PathBuf::from("."),
            file_size_mb: 512,
            thread_counts: vec![2, 4, 6, 8, 12],
            iterations: 3,
            baseline: ImplementationSpec::new("seq", "Sequential"),
            implementations: vec![
                ImplementationSpec::new("bsp", "BSP (Static)"),
                ImplementationSpec::new("ws", "Work Stealing"),
            ],
            datasets: vec![DatasetKind::Fragmented, DatasetKind::RealworldMixed],
            seed: 42,
            timeout_secs: None,
            report_path: Some(PathBuf::from("speedup_results.json")),
            charts: true,
            chart_font: None,
        }
    }
}

fn default_executable() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("pczip.exe")
    } else {
        PathBuf::from("./pczip")
    }
}

impl BenchConfig {
    /// Loads a configuration from a JSON file; missing fields keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
        let config: BenchConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.thread_counts.is_empty() {
            return Err(HarnessError::Config("thread_counts must not be empty".into()));
        }
        if self.thread_counts.contains(&0) {
            return Err(HarnessError::Config("thread counts must be positive".into()));
        }
        if self.thread_counts.windows(2).any(|w| w[0] >= w[1]) {
            return Err(HarnessError::Config(format!(
                "thread_counts must be strictly ascending, got {:?}",
                self.thread_counts
            )));
        }
        if self.iterations == 0 {
            return Err(HarnessError::Config("iterations must be at least 1".into()));
        }
        self.file_size_bytes()?;
        if self.datasets.is_empty() {
            return Err(HarnessError::Config("no datasets configured".into()));
        }

        let mut seen = HashSet::new();
        for implementation in &self.implementations {
            if implementation.key == self.baseline.key {
                return Err(HarnessError::Config(format!(
                    "baseline implementation '{}' cannot also be swept",
                    implementation.key
                )));
            }
            if !seen.insert(implementation.key.as_str()) {
                return Err(HarnessError::Config(format!(
                    "implementation '{}' listed twice",
                    implementation.key
                )));
            }
        }

        let mut kinds = HashSet::new();
        for dataset in &self.datasets {
            if !kinds.insert(dataset.key()) {
                return Err(HarnessError::Config(format!("dataset '{}' listed twice", dataset.key())));
            }
        }

        Ok(())
    }

    pub fn file_size_bytes(&self) -> Result<u64> {
        mib_to_bytes(self.file_size_mb)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
