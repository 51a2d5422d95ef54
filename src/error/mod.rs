use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while generating corpora or driving the external tool.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("build command `{command}` failed with exit code {code:?}")]
    Build { command: String, code: Option<i32> },

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{mode} with implementation '{impl_key}' ({threads} threads) exited with code {code:?}")]
    ToolFailed {
        mode: &'static str,
        impl_key: String,
        threads: usize,
        code: Option<i32>,
    },

    #[error("{mode} with implementation '{impl_key}' timed out after {after:?}")]
    Timeout {
        mode: &'static str,
        impl_key: String,
        after: Duration,
    },

    #[error("round-trip integrity check failed for dataset '{dataset}'")]
    IntegrityMismatch { dataset: String },

    #[error("chart rendering failed for {path}: {message}")]
    Chart { path: PathBuf, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid block weights: {0}")]
    Sampling(#[from] rand::distributions::WeightedError),
}

impl HarnessError {
    /// Wraps an I/O error together with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        HarnessError::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
