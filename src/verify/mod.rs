//! Round-trip integrity check against the reference decompressor.

use crate::compressor::{run_decompress, Compressor};
use crate::error::{HarnessError, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const HASH_CHUNK: usize = 1024 * 1024;

/// A temporary file that is removed when the guard goes out of scope.
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Claims `path`, removing anything already there.
    pub fn claim<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        if path.exists() {
            fs::remove_file(&path).map_err(|e| HarnessError::io(&path, e))?;
        }
        Ok(ScratchFile { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// SHA-256 of a file, streamed in 1 MiB chunks.
pub fn file_digest(path: &Path) -> Result<[u8; 32]> {
    let mut file = File::open(path).map_err(|e| HarnessError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_CHUNK];
    loop {
        let n = file.read(&mut buffer).map_err(|e| HarnessError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hasher.finalize().into())
}

/// Decompresses `compressed` with `reference_impl` into `scratch` and
/// compares it with `original`.
///
/// A failed decompression counts as a mismatch. The scratch file is gone
/// when this returns, whatever the outcome.
pub fn verify_integrity<C: Compressor + ?Sized>(
    tool: &mut C,
    reference_impl: &str,
    original: &Path,
    compressed: &Path,
    scratch: &Path,
) -> Result<bool> {
    let decoded = ScratchFile::claim(scratch)?;

    if let Err(err) = run_decompress(tool, compressed, decoded.path(), reference_impl) {
        warn!(compressed = %compressed.display(), error = %err, "reference decompression failed");
        return Ok(false);
    }

    let matches = file_digest(original)? == file_digest(decoded.path())?;
    if matches {
        info!(original = %original.display(), "round trip verified");
    } else {
        warn!(original = %original.display(), "decoded content differs from original");
    }
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compressor::Invocation;
    use std::time::Duration;

    /// Decompresses by copying, optionally flipping the first byte.
    struct CopyBack {
        corrupt: bool,
        fail: bool,
        scratch_seen: Option<PathBuf>,
    }

    impl Compressor for CopyBack {
        fn run(&mut self, invocation: &Invocation) -> Result<Duration> {
            self.scratch_seen = Some(invocation.output.to_path_buf());
            assert_eq!(invocation.impl_key, "seq");
            let mut data = fs::read(invocation.input).unwrap();
            if self.corrupt {
                data[0] ^= 0xff;
            }
            fs::write(invocation.output, data).unwrap();
            if self.fail {
                return Err(HarnessError::ToolFailed {
                    mode: invocation.mode.as_str(),
                    impl_key: invocation.impl_key.to_string(),
                    threads: invocation.threads,
                    code: Some(1),
                });
            }
            Ok(Duration::ZERO)
        }

        fn name(&self) -> &str {
            "copy-back"
        }
    }

    fn setup() -> (tempfile::TempDir, PathBuf, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("data.bin");
        let compressed = dir.path().join("data.pcz");
        let scratch = dir.path().join("check_integrity.bin");
        fs::write(&original, b"hello integrity").unwrap();
        fs::write(&compressed, b"hello integrity").unwrap();
        (dir, original, compressed, scratch)
    }

    #[test]
    fn identical_content_verifies() {
        let (_dir, original, compressed, scratch) = setup();
        let mut tool = CopyBack { corrupt: false, fail: false, scratch_seen: None };
        assert!(verify_integrity(&mut tool, "seq", &original, &compressed, &scratch).unwrap());
        assert_eq!(tool.scratch_seen.as_deref(), Some(scratch.as_path()));
        assert!(!scratch.exists());
    }

    #[test]
    fn digest_mismatch_fails_and_removes_scratch() {
        let (_dir, original, compressed, scratch) = setup();
        let mut tool = CopyBack { corrupt: true, fail: false, scratch_seen: None };
        assert!(!verify_integrity(&mut tool, "seq", &original, &compressed, &scratch).unwrap());
        assert!(!scratch.exists());
    }

    #[test]
    fn decompression_failure_is_a_mismatch() {
        let (_dir, original, compressed, scratch) = setup();
        let mut tool = CopyBack { corrupt: false, fail: true, scratch_seen: None };
        assert!(!verify_integrity(&mut tool, "seq", &original, &compressed, &scratch).unwrap());
        assert!(!scratch.exists());
    }

    #[test]
    fn digest_depends_on_content() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::write(&a, vec![1u8; 3 * HASH_CHUNK + 7]).unwrap();
        fs::write(&b, vec![1u8; 3 * HASH_CHUNK + 7]).unwrap();
        assert_eq!(file_digest(&a).unwrap(), file_digest(&b).unwrap());
        fs::write(&b, vec![2u8; 3 * HASH_CHUNK + 7]).unwrap();
        assert_ne!(file_digest(&a).unwrap(), file_digest(&b).unwrap());
    }
}
