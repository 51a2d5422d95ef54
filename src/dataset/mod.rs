//! Synthetic corpora with controlled compressibility structure.
//!
//! Every generator streams into a [`Write`] sink through bounded buffers, so
//! corpora of several hundred megabytes never sit in memory at once.

pub mod fragmented;
pub mod mixed;

use crate::error::{HarnessError, Result};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use self::mixed::MixedGenerator;

const WRITE_BUFFER: usize = 1024 * 1024;

/// The corpora the benchmark knows how to synthesize.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    /// Random islands around a long zero gap.
    Fragmented,
    /// Weighted mix of zeros, text, JSON logs, media-like and random blocks.
    RealworldMixed,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 2] = [DatasetKind::Fragmented, DatasetKind::RealworldMixed];

    pub fn key(&self) -> &'static str {
        match self {
            DatasetKind::Fragmented => "fragmented",
            DatasetKind::RealworldMixed => "realworld_mixed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DatasetKind::Fragmented => "Fragmented (20% rand | 60% zeros | 20% rand)",
            DatasetKind::RealworldMixed => "Mixed: text+JSON+zeros+media-like+random",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        DatasetKind::ALL.into_iter().find(|kind| kind.key() == key)
    }

    /// Location of the corpus file inside `dir`.
    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.bin", self.key()))
    }
}

/// A corpus materialized on disk.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub kind: DatasetKind,
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl Dataset {
    pub fn key(&self) -> &'static str {
        self.kind.key()
    }

    pub fn label(&self) -> &'static str {
        self.kind.label()
    }

    /// Writes the corpus of `kind` into `dir`, replacing any previous file.
    ///
    /// The mixed corpus is reproducible for a given `seed` and size. The
    /// fragmented corpus draws from OS entropy and differs on every call.
    pub fn generate(kind: DatasetKind, dir: &Path, size_bytes: u64, seed: u64) -> Result<Dataset> {
        let path = kind.path_in(dir);
        let start = Instant::now();

        match kind {
            DatasetKind::Fragmented => {
                let mut rng = rand::thread_rng();
                write_file(&path, |out| fragmented::write_fragmented(out, size_bytes, &mut rng))?;
            }
            DatasetKind::RealworldMixed => {
                let generator = MixedGenerator::new()?;
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let mut layout = Vec::new();
                write_file(&path, |out| {
                    layout = generator.write(out, size_bytes, &mut rng)?;
                    Ok(())
                })?;
                debug!(blocks = layout.len(), summary = %mixed::summarize(&layout), "mixed layout");
            }
        }

        info!(
            dataset = kind.key(),
            path = %path.display(),
            size_bytes,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "generated dataset"
        );

        Ok(Dataset { kind, path, size_bytes })
    }
}

/// Recreates `path` and streams the generator output into it.
fn write_file<F>(path: &Path, generate: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    if path.exists() {
        fs::remove_file(path).map_err(|e| HarnessError::io(path, e))?;
    }
    let file = File::create(path).map_err(|e| HarnessError::io(path, e))?;
    let mut out = BufWriter::with_capacity(WRITE_BUFFER, file);
    generate(&mut out).map_err(|e| HarnessError::io(path, e))?;
    out.flush().map_err(|e| HarnessError::io(path, e))?;
    Ok(())
}

/// Writes `len` zero bytes using a single buffer of at most `chunk` bytes.
pub(crate) fn write_zeros<W: Write + ?Sized>(out: &mut W, len: u64, chunk: usize) -> io::Result<()> {
    let zeros = vec![0u8; chunk_len(len, chunk)];
    let mut remaining = len;
    while remaining > 0 {
        let n = chunk_len(remaining, zeros.len());
        out.write_all(&zeros[..n])?;
        remaining -= n as u64;
    }
    Ok(())
}

/// Writes `len` bytes drawn from `rng`, refilling one buffer of at most `chunk` bytes.
pub(crate) fn write_random<W, R>(out: &mut W, len: u64, chunk: usize, rng: &mut R) -> io::Result<()>
where
    W: Write + ?Sized,
    R: RngCore + ?Sized,
{
    let mut buffer = vec![0u8; chunk_len(len, chunk)];
    let mut remaining = len;
    while remaining > 0 {
        let n = chunk_len(remaining, buffer.len());
        rng.fill_bytes(&mut buffer[..n]);
        out.write_all(&buffer[..n])?;
        remaining -= n as u64;
    }
    Ok(())
}

#[inline]
fn chunk_len(remaining: u64, chunk: usize) -> usize {
    remaining.min(chunk as u64) as usize
}
