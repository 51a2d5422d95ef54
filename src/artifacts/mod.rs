//! Tracks every compressed artifact of a run and removes them all at the end.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extension shared by every compressed artifact the tool writes.
pub const ARTIFACT_EXTENSION: &str = "pcz";

/// Append-only registry of output files, drained by [`ArtifactTracker::cleanup`].
///
/// Cleanup also runs on drop, so an unwinding run still leaves nothing behind.
#[derive(Debug)]
pub struct ArtifactTracker {
    dir: PathBuf,
    tracked: Vec<PathBuf>,
}

impl ArtifactTracker {
    /// Tracks artifacts whose stray leftovers live in `dir`.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        ArtifactTracker {
            dir: dir.into(),
            tracked: Vec::new(),
        }
    }

    pub fn track<P: Into<PathBuf>>(&mut self, path: P) {
        self.tracked.push(path.into());
    }

    pub fn tracked(&self) -> &[PathBuf] {
        &self.tracked
    }

    /// Removes tracked files, then sweeps `dir` for any `*.pcz` left over.
    ///
    /// Returns the number of files removed. Errors are ignored, so calling it
    /// again is harmless and removes nothing.
    pub fn cleanup(&mut self) -> usize {
        let mut removed = 0;
        for path in self.tracked.drain(..) {
            if path.exists() && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }

        if let Ok(entries) = fs::read_dir(&self.dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_file() && is_artifact(&path) && fs::remove_file(&path).is_ok() {
                    removed += 1;
                }
            }
        }

        debug!(dir = %self.dir.display(), removed, "artifact cleanup");
        removed
    }
}

impl Drop for ArtifactTracker {
    fn drop(&mut self) {
        if !self.tracked.is_empty() {
            self.cleanup();
        }
    }
}

fn is_artifact(path: &Path) -> bool {
    path.extension().map(|ext| ext == ARTIFACT_EXTENSION).unwrap_or(false)
}
